use sea_orm::entity::prelude::*;
use serde::Serialize;
use shared::DomainStatus;

/// A verified sending/receiving domain, owner of the catch-all fallback
/// consulted during the routing pipeline's endpoint resolution.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "email_domain")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: String,

    pub domain: String,
    pub user_id: String,
    pub status: DomainStatus,

    pub can_receive_emails: bool,
    pub is_catch_all_enabled: bool,
    pub catch_all_endpoint_id: Option<String>,

    /// legacy path predating the `endpoint` table.
    pub catch_all_webhook_id: Option<String>,

    pub receive_dmarc_emails: bool,
    pub inherits_from_parent: bool,
    pub parent_domain: Option<String>,
    pub tenant_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::email_address::Entity")]
    EmailAddress,
    #[sea_orm(has_many = "super::blocked_email::Entity")]
    BlockedEmail,
    #[sea_orm(
        belongs_to = "super::endpoint::Entity",
        from = "Column::CatchAllEndpointId",
        to = "super::endpoint::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    CatchAllEndpoint,
}

impl Related<super::email_address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailAddress.def()
    }
}

impl Related<super::blocked_email::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BlockedEmail.def()
    }
}

impl Related<super::endpoint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CatchAllEndpoint.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
