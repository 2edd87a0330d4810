use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use shared::dto::guard::{ExplicitRuleConfig, RuleActionConfig};
use shared::GuardRuleType;

/// A priority-ordered policy rule evaluated between threading and routing.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "guard_rule")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: String,

    pub user_id: String,
    pub name: String,
    pub r#type: GuardRuleType,
    pub is_active: bool,

    /// higher priority rules are evaluated first; the first match wins.
    pub priority: i32,

    #[sea_orm(column_type = "Json")]
    pub config: ExplicitRuleConfig,
    #[sea_orm(column_type = "Json")]
    pub actions: RuleActionConfig,

    pub trigger_count: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::structured_email::Entity")]
    StructuredEmail,
}

impl Related<super::structured_email::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StructuredEmail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
