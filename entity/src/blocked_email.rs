use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A recipient address suppressed from forwarding on a given domain, read
/// by the forwarder's blocklist filter and written by the bounce recorder
/// on a hard bounce.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "blocked_email")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: String,

    pub email_address: String,
    pub domain_id: String,
    pub reason: Option<String>,
    pub blocked_by: String,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::email_domain::Entity",
        from = "Column::DomainId",
        to = "super::email_domain::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    EmailDomain,
}

impl Related<super::email_domain::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailDomain.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
