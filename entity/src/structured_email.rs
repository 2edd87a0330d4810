use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use shared::dto::email::{AddressList, AttachmentList, Headers, MessageIdList};
use shared::StructuredEmailGuardAction;

/// A single inbound message after MIME parsing, the unit the routing
/// pipeline's `RouteEmail` entrypoint operates on.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "structured_email")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: String,

    /// Foreign ref to the raw received blob, not this table's own key.
    #[sea_orm(unique)]
    pub email_id: String,

    pub user_id: String,
    pub message_id: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub subject: Option<String>,
    pub recipient: String,

    #[sea_orm(column_type = "Json")]
    pub from_data: AddressList,
    #[sea_orm(column_type = "Json")]
    pub to_data: AddressList,
    #[sea_orm(column_type = "Json")]
    pub cc_data: AddressList,
    #[sea_orm(column_type = "Json")]
    pub bcc_data: AddressList,
    #[sea_orm(column_type = "Json")]
    pub reply_to_data: AddressList,

    pub in_reply_to: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub references: MessageIdList,

    #[sea_orm(column_type = "Text", nullable)]
    pub text_body: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub html_body: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub raw_content: Option<String>,

    #[sea_orm(column_type = "Json")]
    pub attachments: AttachmentList,
    #[sea_orm(column_type = "Json")]
    pub headers: Headers,

    pub priority: Option<String>,
    pub parse_success: bool,
    pub parse_error: Option<String>,

    pub thread_id: Option<String>,
    pub thread_position: Option<i32>,

    pub guard_blocked: bool,
    pub guard_reason: Option<String>,
    pub guard_action: Option<StructuredEmailGuardAction>,
    pub guard_rule_id: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub guard_metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::email_thread::Entity",
        from = "Column::ThreadId",
        to = "super::email_thread::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    EmailThread,
    #[sea_orm(
        belongs_to = "super::guard_rule::Entity",
        from = "Column::GuardRuleId",
        to = "super::guard_rule::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    GuardRule,
    #[sea_orm(has_many = "super::endpoint_delivery::Entity")]
    EndpointDelivery,
}

impl Related<super::email_thread::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailThread.def()
    }
}

impl Related<super::guard_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GuardRule.def()
    }
}

impl Related<super::endpoint_delivery::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EndpointDelivery.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
