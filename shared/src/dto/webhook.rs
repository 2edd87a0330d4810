//! Shapes exchanged with webhook endpoints: the outgoing payload envelope
//! (spec.md §4.3's canonical shape), the response bookkeeping stored on
//! `endpoint_delivery.response_data`, and the handful of third-party
//! formats the webhook deliverer can render into.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

use super::email::{AddressList, Headers};
use crate::EndpointType;

/// Selects an alternate wire shape for a webhook endpoint. `None`/absent
/// means the native `inbound` envelope below.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookFormatHint {
    Discord,
    Slack,
}

/// A single attachment as rendered into a webhook payload: no inline body,
/// just enough metadata plus the download URL spec.md §4.3 describes
/// (`<baseUrl>/attachments/<structuredId>/<urlEncoded(filename||"attachment")>`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPayload {
    pub filename: Option<String>,
    pub content_type: String,
    pub size: u64,
    pub download_url: String,
}

/// The `email.parsedData` sub-object: the full parsed shape, attachments
/// annotated with download URLs, and the raw MIME content (subject to the
/// size governor's base64-stripping pass).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDataPayload {
    pub from: AddressList,
    pub to: AddressList,
    pub cc: AddressList,
    pub bcc: AddressList,
    pub reply_to: AddressList,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub raw: Option<String>,
    pub attachments: Vec<AttachmentPayload>,
    pub headers: Headers,
}

/// The `email.cleanedContent` sub-object: sanitized HTML/text plus the same
/// attachment/header shape as `parsedData`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanedContentPayload {
    pub html: Option<String>,
    pub text: Option<String>,
    pub has_html: bool,
    pub has_text: bool,
    pub attachments: Vec<AttachmentPayload>,
    pub headers: Headers,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEmailPayload {
    pub id: String,
    pub message_id: Option<String>,
    pub from: AddressList,
    pub to: AddressList,
    pub recipient: String,
    pub subject: Option<String>,
    pub received_at: DateTime<Utc>,
    pub thread_id: Option<String>,
    pub thread_position: Option<i32>,
    pub parsed_data: ParsedDataPayload,
    pub cleaned_content: CleanedContentPayload,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEndpointPayload {
    pub id: String,
    pub name: String,
    pub r#type: EndpointType,
}

/// The canonical `inbound` envelope spec.md §4.3 names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub email: WebhookEmailPayload,
    pub endpoint: WebhookEndpointPayload,
}

/// Minimal Discord webhook body: a single `content` string plus one rich
/// embed carrying subject/from/received-at.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscordPayload {
    pub content: String,
    pub embeds: Vec<DiscordEmbed>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
    pub fields: Vec<DiscordEmbedField>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscordEmbedField {
    pub name: String,
    pub value: String,
}

/// Minimal Slack incoming-webhook body: `text` plus a single section block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlackPayload {
    pub text: String,
    pub blocks: Vec<SlackBlock>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SlackBlock {
    Section { text: SlackText },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlackText {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Recorded on `endpoint_delivery.response_data` after a delivery attempt,
/// regardless of endpoint type or outcome. The webhook fields mirror
/// spec.md §4.3 step 7's shape (`legacy_webhook_id` added for the legacy
/// delivery path, SPEC_FULL supplement #1); the `to_addresses`/`from_address`/
/// `forwarded_at` fields are the email-forwarder's analogous success record
/// (§4.4 step 7). A given row populates one family or the other, never both.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponseData {
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub response_headers: Option<HashMap<String, String>>,
    pub error: Option<String>,
    pub url: Option<String>,
    pub payload_size: Option<u64>,
    pub stripped_fields: Option<Vec<String>>,
    pub delivery_time_ms: Option<u64>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub legacy_webhook_id: Option<String>,

    pub to_addresses: Option<Vec<String>>,
    pub from_address: Option<String>,
    pub forwarded_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}
