use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// The pre-`endpoint`-table delivery target, still referenced by
/// `email_address.webhook_id` and `email_domain.catch_all_webhook_id` on
/// rows that predate endpoints. Carries only a bare URL and optional
/// secret; no per-format variants, no custom headers, no retry count.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "webhook")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: String,

    pub user_id: String,
    pub url: String,
    pub secret: Option<String>,
    pub verification_token: Option<String>,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
