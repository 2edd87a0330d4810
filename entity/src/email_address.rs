use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Maps one recipient address to at most one endpoint, the first-priority
/// lookup in the routing pipeline's endpoint resolution.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "email_address")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: String,

    pub address: String,
    pub user_id: String,
    pub domain_id: String,

    pub endpoint_id: Option<String>,

    /// legacy path predating the `endpoint` table; resolved when
    /// `endpoint_id` is absent.
    pub webhook_id: Option<String>,

    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::endpoint::Entity",
        from = "Column::EndpointId",
        to = "super::endpoint::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Endpoint,
    #[sea_orm(
        belongs_to = "super::email_domain::Entity",
        from = "Column::DomainId",
        to = "super::email_domain::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    EmailDomain,
}

impl Related<super::endpoint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Endpoint.def()
    }
}

impl Related<super::email_domain::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailDomain.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
