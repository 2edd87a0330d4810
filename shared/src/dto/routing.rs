//! Wire shapes for the router service's RabbitMQ job and HTTP ingestion
//! surfaces — not used by `inbound_core` itself, which only ever sees the
//! already-decoded `structured_email`/raw-DSN-bytes arguments.

use serde::{Deserialize, Serialize};

/// Body of a `routeEmail` delivery on [`crate::constants::rabbitmq::INBOUND_ROUTING_QUEUE`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEmailJob {
    /// `structured_email.id` or `structured_email.email_id`.
    pub email_id: String,
}

/// Body of a `routeEmail` delivery's sibling DSN job, carrying the raw
/// RFC-822 bytes of a bounce/complaint notification received out-of-band
/// (the ingestion boundary decides this is a DSN; this service only parses
/// and records it).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DsnIngestJob {
    /// Raw-blob key of the DSN message itself, used for idempotent
    /// re-ingestion.
    pub dsn_email_id: String,

    /// Base64-encoded raw RFC-822 MIME bytes.
    pub raw_base64: String,

    pub received_at: chrono::DateTime<chrono::Utc>,
}
