use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use shared::dto::webhook::DeliveryResponseData;
use shared::{DeliveryStatus, DeliveryType};

/// The idempotency lock of the whole pipeline: `UNIQUE(email_id, endpoint_id)`
/// means a second `RouteEmail` for the same pair hits a unique-constraint
/// violation, mapped to `PipelineError::Duplicate` and treated as success.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "endpoint_delivery")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: String,

    pub email_id: String,
    pub endpoint_id: String,
    pub delivery_type: DeliveryType,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,

    #[sea_orm(column_type = "Json", nullable)]
    pub response_data: Option<DeliveryResponseData>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::structured_email::Entity",
        from = "Column::EmailId",
        to = "super::structured_email::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    StructuredEmail,
    #[sea_orm(
        belongs_to = "super::endpoint::Entity",
        from = "Column::EndpointId",
        to = "super::endpoint::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Endpoint,
}

impl Related<super::structured_email::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StructuredEmail.def()
    }
}

impl Related<super::endpoint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Endpoint.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
