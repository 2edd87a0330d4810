//! Events this service publishes to `ROUTING_EVENTS_EXCHANGE`, for
//! downstream consumers (analytics, alerting) that want to observe routing
//! decisions without polling the database.

use chrono::{DateTime, Utc};
use inbound_core::pipeline::RouteOutcome;
use inbound_core::spike::SpikeAlert;
use serde::{Deserialize, Serialize};

use crate::queue::Routable;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOutcomeEvent {
    pub timestamp: DateTime<Utc>,
    pub email_id: String,
    pub outcome: String,
}

impl RouteOutcomeEvent {
    pub fn new(email_id: String, outcome: &RouteOutcome) -> Self {
        let outcome = match outcome {
            RouteOutcome::Stored => "stored",
            RouteOutcome::GuardBlocked => "guard_blocked",
            RouteOutcome::AlreadyDelivered => "already_delivered",
            RouteOutcome::Dispatched => "dispatched",
        }
        .to_string();

        RouteOutcomeEvent { timestamp: Utc::now(), email_id, outcome }
    }
}

impl Routable for RouteOutcomeEvent {
    fn routing_key(&self) -> String {
        format!("email.{}.{}", self.email_id, self.outcome)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpikeAlertEvent {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub current_count: i64,
    pub daily_average: f64,
    pub multiplier: f64,
}

impl From<&SpikeAlert> for SpikeAlertEvent {
    fn from(alert: &SpikeAlert) -> Self {
        SpikeAlertEvent {
            timestamp: alert.detected_at,
            user_id: alert.user_id.clone(),
            current_count: alert.current_count,
            daily_average: alert.daily_average,
            multiplier: alert.multiplier,
        }
    }
}

impl Routable for SpikeAlertEvent {
    fn routing_key(&self) -> String {
        format!("spike.{}", self.user_id)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DsnRecordedEvent {
    pub timestamp: DateTime<Utc>,
    pub dsn_email_id: String,
    pub added_to_blocklist: bool,
}

impl Routable for DsnRecordedEvent {
    fn routing_key(&self) -> String {
        format!("dsn.{}", self.dsn_email_id)
    }
}
