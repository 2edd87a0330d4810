use std::sync::Arc;

use inbound_core::forwarder::OutboundSender;
use inbound_core::persistence::Persistence;
use inbound_core::pipeline::FeatureFlagProvider;
use inbound_core::webhook::WebhookClient;
use lapin::message::Delivery;
use tracing::error;

use super::{routes::default, utils::get_delivery_type};
use crate::queue;

pub struct QueueRouter {
    pub server: Arc<queue::RouterRabbitmq>,
    pub persistence: Arc<dyn Persistence>,
    pub webhook_client: Arc<dyn WebhookClient>,
    pub outbound_sender: Arc<dyn OutboundSender>,
    pub feature_provider: Arc<dyn FeatureFlagProvider>,
    pub base_url: String,
}

impl QueueRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server: Arc<queue::RouterRabbitmq>,
        persistence: Arc<dyn Persistence>,
        webhook_client: Arc<dyn WebhookClient>,
        outbound_sender: Arc<dyn OutboundSender>,
        feature_provider: Arc<dyn FeatureFlagProvider>,
        base_url: String,
    ) -> QueueRouter {
        QueueRouter {
            server,
            persistence,
            webhook_client,
            outbound_sender,
            feature_provider,
            base_url,
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn handle_delivery(&self, delivery: Delivery) {
        let delivery_type = get_delivery_type(&delivery);

        let handler_res = match delivery_type.as_str() {
            shared::constants::rabbitmq::OP_ROUTE_EMAIL => self.route_email_handler(delivery).await,
            shared::constants::rabbitmq::OP_INGEST_DSN => self.ingest_dsn_handler(delivery).await,
            _ => default::handle_delivery_without_corresponding_rpc(delivery).await,
        };

        if let Err(err) = handler_res {
            error!("handler for delivery of type: {} returned error: {}", delivery_type, err);
        }
    }
}
