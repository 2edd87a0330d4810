use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use shared::{BounceSubType, BounceType, DeliveryEventActionTaken};

/// A recorded bounce/complaint, resolved back to the originating sent
/// message, user, domain, and tenant where possible.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "email_delivery_event")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: String,

    pub event_type: String,
    pub bounce_type: Option<BounceType>,
    pub bounce_sub_type: Option<BounceSubType>,

    /// enhanced status code, `X.Y.Z`.
    pub status_code: Option<String>,
    pub status_class: Option<i16>,
    pub status_category: Option<i16>,
    #[sea_orm(column_type = "Text", nullable)]
    pub diagnostic_code: Option<String>,

    pub failed_recipient: Option<String>,
    pub failed_recipient_domain: Option<String>,

    pub original_message_id: Option<String>,
    pub original_sent_email_id: Option<String>,
    pub original_from: Option<String>,
    pub original_to: Option<String>,
    pub original_subject: Option<String>,
    pub original_sent_at: Option<DateTime<Utc>>,

    /// the raw-blob key of the inbound DSN this event was parsed from;
    /// unique so a redelivered DSN is a no-op.
    #[sea_orm(unique)]
    pub dsn_email_id: Option<String>,
    pub dsn_received_at: Option<DateTime<Utc>>,

    pub reporting_mta: Option<String>,
    pub remote_mta: Option<String>,

    pub user_id: Option<String>,
    pub domain_id: Option<String>,
    pub domain_name: Option<String>,
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,

    pub action_taken: DeliveryEventActionTaken,
    pub added_to_blocklist: bool,
    pub blocklist_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub raw_dsn_content: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sent_email::Entity",
        from = "Column::OriginalSentEmailId",
        to = "super::sent_email::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    SentEmail,
    #[sea_orm(
        belongs_to = "super::email_domain::Entity",
        from = "Column::DomainId",
        to = "super::email_domain::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    EmailDomain,
    #[sea_orm(
        belongs_to = "super::blocked_email::Entity",
        from = "Column::BlocklistId",
        to = "super::blocked_email::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    BlockedEmail,
}

impl Related<super::sent_email::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SentEmail.def()
    }
}

impl Related<super::email_domain::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailDomain.def()
    }
}

impl Related<super::blocked_email::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BlockedEmail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
