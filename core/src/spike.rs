//! Per-user rolling-baseline sending-volume spike detection with a
//! process-wide alert cooldown (C8).

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::errors::PipelineError;
use crate::persistence::Persistence;

const HISTORICAL_DAYS: i64 = 7;
const SPIKE_THRESHOLD_MULTIPLIER: f64 = 3.0;
const MIN_HISTORICAL_EMAILS: f64 = 5.0;
const MIN_CURRENT_EMAILS_FOR_ALERT: i64 = 10;
const ALERT_COOLDOWN_HOURS: i64 = 4;

/// Payload handed to the notification collaborator when a spike fires.
#[derive(Clone, Debug, PartialEq)]
pub struct SpikeAlert {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub current_count: i64,
    pub daily_average: f64,
    pub multiplier: f64,
    pub detected_at: DateTime<Utc>,
}

/// External collaborator the detector emits alerts to (Slack-shaped, per
/// spec.md §6, but the implementation may post to any webhook shape).
#[async_trait::async_trait]
pub trait NotifySpike: Send + Sync {
    async fn notify(&self, alert: SpikeAlert);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpikeCheckResult {
    NotASpike { reason: &'static str },
    Spike,
}

/// Process-wide `lastAlertAt` map. Per spec.md §5, this is intentionally
/// per-node: an operator running multiple nodes accepts per-node cooldown.
pub struct SpikeDetector {
    last_alert_at: DashMap<String, DateTime<Utc>>,
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SpikeDetector {
    pub fn new() -> Self {
        SpikeDetector {
            last_alert_at: DashMap::new(),
        }
    }

    /// Drops cooldown entries older than `2 * ALERT_COOLDOWN_HOURS`,
    /// bounding the map's lifetime opportunistically rather than on a timer.
    fn evict_stale(&self) {
        let cutoff = Utc::now() - Duration::hours(2 * ALERT_COOLDOWN_HOURS);
        self.last_alert_at.retain(|_, at| *at > cutoff);
    }

    fn in_cooldown(&self, user_id: &str) -> bool {
        self.last_alert_at
            .get(user_id)
            .map(|at| Utc::now() - *at < Duration::hours(ALERT_COOLDOWN_HOURS))
            .unwrap_or(false)
    }

    /// Evaluates and, if a spike is detected, notifies `notifier` and
    /// records the cooldown. `user_email`/`user_name` are caller-supplied
    /// display metadata for the alert payload (the detector itself has no
    /// user-profile lookup).
    pub async fn check(
        &self,
        persistence: &dyn Persistence,
        notifier: &dyn NotifySpike,
        user_id: &str,
        user_email: Option<String>,
        user_name: Option<String>,
    ) -> Result<SpikeCheckResult, PipelineError> {
        self.evict_stale();

        if self.in_cooldown(user_id) {
            return Ok(SpikeCheckResult::NotASpike { reason: "cooldown" });
        }

        let now = Utc::now();
        let current_count = persistence
            .count_sent_emails_between(user_id, now - Duration::hours(24), now)
            .await?;

        if current_count < MIN_CURRENT_EMAILS_FOR_ALERT {
            return Ok(SpikeCheckResult::NotASpike {
                reason: "below_minimum_current_volume",
            });
        }

        let historical_count = persistence
            .count_sent_emails_between(
                user_id,
                now - Duration::hours((HISTORICAL_DAYS + 1) * 24),
                now - Duration::hours(24),
            )
            .await?;

        let daily_average = historical_count as f64 / HISTORICAL_DAYS as f64;

        if daily_average * HISTORICAL_DAYS as f64 < MIN_HISTORICAL_EMAILS {
            return Ok(SpikeCheckResult::NotASpike {
                reason: "insufficient_baseline",
            });
        }

        let multiplier = current_count as f64 / daily_average;

        if multiplier < SPIKE_THRESHOLD_MULTIPLIER {
            return Ok(SpikeCheckResult::NotASpike { reason: "below_threshold" });
        }

        notifier
            .notify(SpikeAlert {
                user_id: user_id.to_string(),
                email: user_email,
                name: user_name,
                current_count,
                daily_average,
                multiplier,
                detected_at: now,
            })
            .await;

        self.last_alert_at.insert(user_id.to_string(), now);

        Ok(SpikeCheckResult::Spike)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_window_is_four_hours() {
        let detector = SpikeDetector::new();
        detector.last_alert_at.insert("u1".to_string(), Utc::now());
        assert!(detector.in_cooldown("u1"));

        detector
            .last_alert_at
            .insert("u2".to_string(), Utc::now() - Duration::hours(5));
        assert!(!detector.in_cooldown("u2"));
    }

    #[test]
    fn evict_stale_drops_entries_older_than_double_cooldown() {
        let detector = SpikeDetector::new();
        detector
            .last_alert_at
            .insert("stale".to_string(), Utc::now() - Duration::hours(9));
        detector.last_alert_at.insert("fresh".to_string(), Utc::now());

        detector.evict_stale();

        assert!(detector.last_alert_at.get("stale").is_none());
        assert!(detector.last_alert_at.get("fresh").is_some());
    }
}
