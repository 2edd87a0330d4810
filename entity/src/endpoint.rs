use sea_orm::entity::prelude::*;
use serde::Serialize;
use shared::dto::endpoint::EndpointConfig;
use shared::{EndpointType, WebhookFormat};

/// A user-configured delivery destination: a webhook URL or a forwarding
/// mail recipient/group. `config`'s shape is determined by `type` (see
/// `shared::dto::endpoint::EndpointConfig`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "endpoint")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: String,

    pub user_id: String,
    pub r#type: EndpointType,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,

    /// only meaningful when `type = webhook`.
    pub webhook_format: Option<WebhookFormat>,

    #[sea_orm(column_type = "Json")]
    pub config: EndpointConfig,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::email_address::Entity")]
    EmailAddress,
    #[sea_orm(has_many = "super::endpoint_delivery::Entity")]
    EndpointDelivery,
}

impl Related<super::email_address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailAddress.def()
    }
}

impl Related<super::endpoint_delivery::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EndpointDelivery.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
