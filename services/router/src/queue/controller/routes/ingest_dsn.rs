use base64::Engine;
use inbound_core::bounce_recorder;
use lapin::message::Delivery;
use shared::dto::routing::DsnIngestJob;
use tracing::{event, Level};

use crate::queue::controller::{dto::events::DsnRecordedEvent, router::QueueRouter, utils::ack_delivery};

impl QueueRouter {
    /// `ingestDsn` job handler: parses and records a bounce/complaint
    /// notification (C6), auto-blocklisting hard bounces.
    #[tracing::instrument(skip_all)]
    pub async fn ingest_dsn_handler(&self, delivery: Delivery) -> Result<(), String> {
        ack_delivery(&delivery).await?;

        let job = serde_json::from_slice::<DsnIngestJob>(&delivery.data)
            .map_err(|e| format!("parse error: {:#?}", e))?;

        let raw = base64::engine::general_purpose::STANDARD
            .decode(&job.raw_base64)
            .map_err(|e| format!("invalid base64 in raw_base64: {e}"))?;

        event!(Level::INFO, dsn_email_id = job.dsn_email_id);

        let outcome = bounce_recorder::record(
            self.persistence.as_ref(),
            &job.dsn_email_id,
            &raw,
            job.received_at,
        )
        .await
        .map_err(|e| e.to_string())?;

        self.server
            .publish_event(DsnRecordedEvent {
                timestamp: chrono::Utc::now(),
                dsn_email_id: job.dsn_email_id,
                added_to_blocklist: outcome.added_to_blocklist,
            })
            .await?;

        Ok(())
    }
}
