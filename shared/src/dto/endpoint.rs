//! Typed, discriminated-union shape for `endpoint.config`, keyed on
//! `endpoint.type`.

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EndpointConfig {
    Webhook(WebhookConfig),
    Email(EmailConfig),
    EmailGroup(EmailGroupConfig),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub url: String,

    /// seconds, 1-300
    pub timeout: u16,

    /// 0-10, informational only: the webhook deliverer never retries internally
    #[serde(default)]
    pub retry_attempts: u8,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// generated on first delivery, then persisted back via compare-and-set
    pub verification_token: Option<String>,

    /// opaque shared secret used to compute `X-Webhook-Signature`
    pub secret: Option<String>,

    #[serde(default)]
    pub format: Option<super::webhook::WebhookFormatHint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    pub forward_to: String,
    #[serde(default = "default_true")]
    pub include_attachments: bool,
    pub subject_prefix: Option<String>,
    pub from_address: Option<String>,
    pub sender_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailGroupConfig {
    pub emails: Vec<String>,
    #[serde(default = "default_true")]
    pub include_attachments: bool,
    pub subject_prefix: Option<String>,
    pub from_address: Option<String>,
    pub sender_name: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Contract for the legacy, pre-`endpoint`-table webhook path: a bare
/// URL + optional secret, none of the
/// per-endpoint retry/header customization a full `Endpoint` carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct LegacyWebhookConfig {
    pub url: String,
    pub secret: Option<String>,
    pub verification_token: Option<String>,
}
