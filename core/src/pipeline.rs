//! `RouteEmail(emailId)`: the inbound routing state machine tying together
//! the threader, guard engine, webhook deliverer, and email forwarder (C7).

use async_trait::async_trait;
use entity::{endpoint, structured_email, webhook as legacy_webhook};
use shared::{EndpointType, GuardRuleAction, StructuredEmailGuardAction};

use crate::errors::PipelineError;
use crate::forwarder::{self, OutboundSender};
use crate::guard;
use crate::persistence::Persistence;
use crate::threader;
use crate::webhook::{self, WebhookClient};

/// `CheckFeature(userId, featureId) → allowed`; per spec.md §6, a failing
/// check is treated as `allowed=false`, which implementations should bake
/// into their own `is_enabled`.
#[async_trait]
pub trait FeatureFlagProvider: Send + Sync {
    async fn is_enabled(&self, user_id: &str, feature_id: &str) -> bool;
}

const INBOUND_GUARD_FEATURE: &str = "inbound_guard";

/// Terminal state `route_email` reached. `NotFound`/`Unprocessable` instead
/// surface as `Err` — every other outcome, including delivery failures
/// already recorded on the `endpoint_delivery` row, is `Ok`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No routing applied (DMARC-suppressed, guard-blocked, or no endpoint
    /// resolved); the email remains stored.
    Stored,
    GuardBlocked,
    AlreadyDelivered,
    Dispatched,
}

enum ResolvedTarget {
    Endpoint(endpoint::Model),
    LegacyWebhook(legacy_webhook::Model),
    None,
}

/// Entry point. Idempotent and safe to invoke multiple times for the same
/// `email_id_or_alias`.
pub async fn route_email(
    persistence: &dyn Persistence,
    webhook_client: &dyn WebhookClient,
    outbound_sender: &dyn OutboundSender,
    feature_provider: &dyn FeatureFlagProvider,
    email_id_or_alias: &str,
    base_url: &str,
) -> Result<RouteOutcome, PipelineError> {
    // 1. Load.
    let mut email = persistence
        .get_structured_email(email_id_or_alias)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("structured_email {email_id_or_alias}")))?;

    if !email.parse_success {
        return Err(PipelineError::Unprocessable(format!(
            "structured_email {} failed to parse",
            email.id
        )));
    }

    // 2. Thread. Errors are logged and swallowed; routing continues without
    // thread fields.
    let thread = match threader::thread_email(persistence, &email).await {
        Ok(attachment) => Some(attachment),
        Err(err) => {
            tracing::warn!(email_id = %email.id, error = %err, "threading failed, continuing unthreaded");
            None
        }
    };

    if let Some(attachment) = &thread {
        email.thread_id = Some(attachment.thread_id.clone());
        email.thread_position = Some(attachment.thread_position);
    }

    // 3. DMARC guard.
    if is_dmarc_localpart(&email.recipient) {
        if let Some(domain) = domain_of(&email.recipient) {
            if let Some(domain_row) = persistence.get_email_domain_by_name(domain, &email.user_id).await? {
                if !domain_row.receive_dmarc_emails {
                    persistence.save_structured_email(email).await?;
                    return Ok(RouteOutcome::Stored);
                }
            }
        }
    }

    // 4. Guard (feature-gated).
    let mut resolved: Option<endpoint::Model> = None;

    if feature_provider.is_enabled(&email.user_id, INBOUND_GUARD_FEATURE).await {
        let user_id = email.user_id.clone();
        let verdict = guard::evaluate(persistence, &email, &user_id).await;

        email.guard_action = Some(StructuredEmailGuardAction::from(verdict.action));
        email.guard_rule_id = verdict.matched_rule_id.clone();

        match verdict.action {
            GuardRuleAction::Block => {
                email.guard_blocked = true;
                persistence.save_structured_email(email).await?;
                return Ok(RouteOutcome::GuardBlocked);
            }
            GuardRuleAction::Route => {
                if let Some(endpoint_id) = verdict.route_to_endpoint_id {
                    if let Some(candidate) = persistence.get_endpoint(&endpoint_id).await? {
                        if candidate.user_id == email.user_id && candidate.is_active {
                            resolved = Some(candidate);
                        }
                    }
                }
            }
            GuardRuleAction::Allow => {}
        }
    }

    // 5. Thread continuity.
    if resolved.is_none() {
        if let Some(attachment) = &thread {
            if !attachment.is_new_thread && attachment.thread_position > 1 {
                if let Some(earliest) = persistence.find_earliest_in_thread(&attachment.thread_id).await? {
                    if earliest.recipient != email.recipient {
                        if let Some(addr) = persistence
                            .get_email_address(&earliest.recipient, &email.user_id)
                            .await?
                        {
                            if addr.is_active {
                                if let Some(endpoint_id) = &addr.endpoint_id {
                                    if let Some(candidate) = persistence.get_endpoint(endpoint_id).await? {
                                        if candidate.is_active {
                                            resolved = Some(candidate);
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    // 6. Resolve endpoint (if not already set by 4 or 5).
    let target = if let Some(endpoint) = resolved {
        ResolvedTarget::Endpoint(endpoint)
    } else {
        resolve_endpoint(persistence, &email).await?
    };

    persistence.save_structured_email(email.clone()).await?;

    match target {
        ResolvedTarget::None => Ok(RouteOutcome::Stored),
        ResolvedTarget::Endpoint(endpoint) => {
            // 7. Idempotency fast-path.
            if persistence
                .get_endpoint_delivery(&email.id, &endpoint.id)
                .await?
                .is_some()
            {
                return Ok(RouteOutcome::AlreadyDelivered);
            }

            // 8. Dispatch.
            let result = match endpoint.r#type {
                EndpointType::Webhook => {
                    webhook::deliver(persistence, webhook_client, &email, &endpoint, base_url).await
                }
                EndpointType::Email | EndpointType::EmailGroup => {
                    forwarder::deliver(persistence, outbound_sender, &email, &endpoint).await
                }
            };

            log_dispatch_failure(&email.id, &endpoint.id, result);
            Ok(RouteOutcome::Dispatched)
        }
        ResolvedTarget::LegacyWebhook(legacy) => {
            if persistence.get_endpoint_delivery(&email.id, &legacy.id).await?.is_some() {
                return Ok(RouteOutcome::AlreadyDelivered);
            }

            let result = webhook::deliver_legacy(persistence, webhook_client, &email, &legacy, base_url).await;
            log_dispatch_failure(&email.id, &legacy.id, result);
            Ok(RouteOutcome::Dispatched)
        }
    }
}

fn log_dispatch_failure(email_id: &str, endpoint_id: &str, result: Result<(), PipelineError>) {
    if let Err(err) = result {
        tracing::error!(email_id, endpoint_id, error = %err, "delivery dispatch did not complete");
    }
}

async fn resolve_endpoint(
    persistence: &dyn Persistence,
    email: &structured_email::Model,
) -> Result<ResolvedTarget, PipelineError> {
    if let Some(address) = persistence.get_email_address(&email.recipient, &email.user_id).await? {
        if address.is_active {
            if let Some(endpoint_id) = &address.endpoint_id {
                if let Some(endpoint) = persistence.get_endpoint(endpoint_id).await? {
                    if endpoint.is_active {
                        return Ok(ResolvedTarget::Endpoint(endpoint));
                    }
                }
            } else if let Some(webhook_id) = &address.webhook_id {
                if let Some(legacy) = persistence.get_webhook(webhook_id).await? {
                    if legacy.is_active {
                        return Ok(ResolvedTarget::LegacyWebhook(legacy));
                    }
                }
            }
        }
    }

    let Some(domain) = domain_of(&email.recipient) else {
        return Ok(ResolvedTarget::None);
    };

    let Some(domain_row) = persistence.get_email_domain_by_name(domain, &email.user_id).await? else {
        return Ok(ResolvedTarget::None);
    };

    if !domain_row.is_catch_all_enabled {
        return Ok(ResolvedTarget::None);
    }

    if let Some(endpoint_id) = &domain_row.catch_all_endpoint_id {
        if let Some(endpoint) = persistence.get_endpoint(endpoint_id).await? {
            if endpoint.is_active {
                return Ok(ResolvedTarget::Endpoint(endpoint));
            }
        }
    }

    if let Some(webhook_id) = &domain_row.catch_all_webhook_id {
        if let Some(legacy) = persistence.get_webhook(webhook_id).await? {
            if legacy.is_active {
                return Ok(ResolvedTarget::LegacyWebhook(legacy));
            }
        }
    }

    Ok(ResolvedTarget::None)
}

fn is_dmarc_localpart(recipient: &str) -> bool {
    recipient
        .split_once('@')
        .map(|(localpart, _)| localpart.eq_ignore_ascii_case("dmarc"))
        .unwrap_or(false)
}

fn domain_of(address: &str) -> Option<&str> {
    address.rsplit_once('@').map(|(_, domain)| domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dmarc_localpart_matching_is_case_insensitive() {
        assert!(is_dmarc_localpart("DMARC@example.com"));
        assert!(is_dmarc_localpart("dmarc@example.com"));
        assert!(!is_dmarc_localpart("support@example.com"));
    }

    #[test]
    fn domain_of_splits_on_last_at() {
        assert_eq!(domain_of("a@b.example.com"), Some("b.example.com"));
        assert_eq!(domain_of("not-an-address"), None);
    }
}
