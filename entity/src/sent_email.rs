use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use shared::dto::email::AddressList;
use shared::SentEmailStatus;

/// An outbound message handed to the sender; threading and bounce
/// resolution both join back to this table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "sent_email")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: String,

    pub user_id: String,
    pub message_id: Option<String>,
    #[sea_orm(unique)]
    pub ses_message_id: Option<String>,

    pub from: String,
    pub from_domain: Option<String>,

    #[sea_orm(column_type = "Json")]
    pub to: AddressList,
    #[sea_orm(column_type = "Json")]
    pub cc: AddressList,
    #[sea_orm(column_type = "Json")]
    pub bcc: AddressList,
    #[sea_orm(column_type = "Json")]
    pub reply_to: AddressList,

    pub subject: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub html_body: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub text_body: Option<String>,

    pub status: SentEmailStatus,
    pub provider: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub provider_response: Option<String>,
    pub failure_reason: Option<String>,

    pub sent_at: Option<DateTime<Utc>>,

    pub thread_id: Option<String>,
    pub thread_position: Option<i32>,

    pub created_at: DateTime<Utc>,
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
}

impl Related<super::email_thread::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailThread.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
