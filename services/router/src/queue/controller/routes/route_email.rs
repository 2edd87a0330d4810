use inbound_core::pipeline;
use lapin::message::Delivery;
use shared::dto::routing::RouteEmailJob;
use tracing::{event, Level};

use crate::{
    config::app_config,
    queue::controller::{dto::events::RouteOutcomeEvent, router::QueueRouter, utils::ack_delivery},
};

impl QueueRouter {
    /// `routeEmail` job handler: runs the full inbound routing pipeline
    /// (C7) for one `structured_email` and publishes its outcome.
    #[tracing::instrument(skip_all)]
    pub async fn route_email_handler(&self, delivery: Delivery) -> Result<(), String> {
        ack_delivery(&delivery).await?;

        let job = serde_json::from_slice::<RouteEmailJob>(&delivery.data)
            .map_err(|e| format!("parse error: {:#?}", e))?;

        event!(Level::INFO, email_id = job.email_id);

        let outcome = pipeline::route_email(
            self.persistence.as_ref(),
            self.webhook_client.as_ref(),
            self.outbound_sender.as_ref(),
            self.feature_provider.as_ref(),
            &job.email_id,
            &app_config().base_url,
        )
        .await
        .map_err(|e| e.to_string())?;

        self.server.publish_event(RouteOutcomeEvent::new(job.email_id, &outcome)).await?;

        Ok(())
    }
}
