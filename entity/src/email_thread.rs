use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use shared::dto::email::ParticipantSet;

/// A conversation identity shared by `structured_email` and `sent_email`
/// rows; `message_count` and the `thread_position` sequence it bounds are
/// maintained exclusively by `core::threader`'s attach step.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "email_thread")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: String,

    pub user_id: String,
    pub root_message_id: String,
    pub normalized_subject: String,

    #[sea_orm(column_type = "Json")]
    pub participant_emails: ParticipantSet,

    pub message_count: i32,
    pub last_message_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::structured_email::Entity")]
    StructuredEmail,
    #[sea_orm(has_many = "super::sent_email::Entity")]
    SentEmail,
}

impl Related<super::structured_email::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StructuredEmail.def()
    }
}

impl Related<super::sent_email::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SentEmail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
