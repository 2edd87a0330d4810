//! Posts spike alerts to a Slack incoming webhook (spec.md §6's
//! `SLACK_ADMIN_WEBHOOK_URL`). A missing URL makes every alert a no-op.

use std::sync::Arc;

use inbound_core::spike::{NotifySpike, SpikeAlert};
use serde_json::json;

use crate::queue::{controller::dto::events::SpikeAlertEvent, RouterRabbitmq};

pub struct SlackSpikeNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackSpikeNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        SlackSpikeNotifier { client: reqwest::Client::new(), webhook_url }
    }
}

#[async_trait::async_trait]
impl NotifySpike for SlackSpikeNotifier {
    async fn notify(&self, alert: SpikeAlert) {
        let Some(url) = &self.webhook_url else {
            tracing::warn!(user_id = %alert.user_id, "spike detected but no Slack webhook configured");
            return;
        };

        let who = alert.name.as_deref().or(alert.email.as_deref()).unwrap_or(&alert.user_id);

        let text = format!(
            "Sending volume spike for {who}: {} emails in the last 24h, {:.1}x the {:.1}/day baseline",
            alert.current_count, alert.multiplier, alert.daily_average
        );

        let body = json!({ "text": text });

        if let Err(err) = self.client.post(url).json(&body).send().await {
            tracing::error!(error = %err, "failed to post spike alert to Slack");
        }
    }
}

/// Fans a detected spike out to both Slack and `ROUTING_EVENTS_EXCHANGE`,
/// so downstream consumers of routing events see spike alerts alongside
/// delivery outcomes without needing Slack access themselves.
pub struct SpikeNotifierFanout {
    slack: SlackSpikeNotifier,
    router_rmq: Arc<RouterRabbitmq>,
}

impl SpikeNotifierFanout {
    pub fn new(slack: SlackSpikeNotifier, router_rmq: Arc<RouterRabbitmq>) -> Self {
        SpikeNotifierFanout { slack, router_rmq }
    }
}

#[async_trait::async_trait]
impl NotifySpike for SpikeNotifierFanout {
    async fn notify(&self, alert: SpikeAlert) {
        let event = SpikeAlertEvent::from(&alert);

        self.slack.notify(alert).await;

        if let Err(err) = self.router_rmq.publish_event(event).await {
            tracing::error!(error = %err, "failed to publish spike alert event");
        }
    }
}
