//! Recipient resolution, blocklist/loop filtering, and outbound handoff for
//! `email`/`email_group` endpoints (C5).

use async_trait::async_trait;
use chrono::Utc;
use entity::{endpoint, structured_email};
use shared::dto::endpoint::EndpointConfig;
use shared::DeliveryType;

use crate::errors::PipelineError;
use crate::persistence::Persistence;

/// Per-tenant SES sending identity resolved from the sending domain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TenantIdentity {
    pub source_arn: Option<String>,
    pub configuration_set_name: Option<String>,
    pub tenant_name: Option<String>,
}

/// Everything the outbound sender needs to place the forwarded message;
/// `parsed_email` is the originating inbound message.
pub struct OutboundHandoff<'a> {
    pub parsed_email: &'a structured_email::Model,
    pub from_address: String,
    pub to_addresses: Vec<String>,
    pub subject_prefix: Option<String>,
    pub include_attachments: bool,
    pub sender_name: Option<String>,
    pub source_arn: Option<String>,
    pub configuration_set_name: Option<String>,
    pub tenant_name: Option<String>,
}

/// Abstraction over the outbound mail sender. Accepts or rejects the
/// handoff synchronously; C5's contract ends at that boundary.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn send(&self, handoff: OutboundHandoff<'_>) -> Result<(), String>;
}

fn recipients_for(config: &EndpointConfig) -> Option<(Vec<String>, Option<String>, bool, Option<String>, Option<String>)> {
    match config {
        EndpointConfig::Email(cfg) => Some((
            vec![cfg.forward_to.clone()],
            cfg.subject_prefix.clone(),
            cfg.include_attachments,
            cfg.from_address.clone(),
            cfg.sender_name.clone(),
        )),
        EndpointConfig::EmailGroup(cfg) => Some((
            cfg.emails.clone(),
            cfg.subject_prefix.clone(),
            cfg.include_attachments,
            cfg.from_address.clone(),
            cfg.sender_name.clone(),
        )),
        EndpointConfig::Webhook(_) => None,
    }
}

/// Removes blocked recipients; the order of the survivors is preserved.
fn filter_blocked(recipients: &[String], blocked: &[String]) -> Vec<String> {
    recipients
        .iter()
        .filter(|r| !blocked.iter().any(|b| b.eq_ignore_ascii_case(r)))
        .cloned()
        .collect()
}

/// True when any candidate recipient, case-insensitively, equals the
/// inbound email's own recipient — a forwarding configuration that would
/// mail itself.
fn is_forwarding_loop(recipients: &[String], inbound_recipient: &str) -> bool {
    let inbound = inbound_recipient.trim().to_lowercase();
    recipients
        .iter()
        .any(|r| r.trim().to_lowercase() == inbound)
}

fn domain_of(address: &str) -> Option<&str> {
    address.rsplit_once('@').map(|(_, domain)| domain)
}

/// Forwards `email` to the recipients named by `endpoint`'s `email` or
/// `email_group` config. Idempotent on `(email.id, endpoint.id)`.
pub async fn deliver(
    persistence: &dyn Persistence,
    sender: &dyn OutboundSender,
    email: &structured_email::Model,
    endpoint: &endpoint::Model,
) -> Result<(), PipelineError> {
    let delivery = match persistence
        .create_pending_delivery(&email.id, &endpoint.id, DeliveryType::EmailForward)
        .await
    {
        Ok(d) => d,
        Err(PipelineError::Duplicate) => return Ok(()),
        Err(other) => return Err(other),
    };

    let Some((recipients, subject_prefix, include_attachments, from_override, sender_name)) =
        recipients_for(&endpoint.config)
    else {
        return Err(PipelineError::Fatal(format!(
            "endpoint {} has a forwarding delivery type but a non-forwarding config",
            endpoint.id
        )));
    };

    let mut blocked = Vec::with_capacity(recipients.len());
    for recipient in &recipients {
        if persistence
            .get_blocked_email(&recipient.to_lowercase())
            .await?
            .is_some()
        {
            blocked.push(recipient.clone());
        }
    }

    let survivors = filter_blocked(&recipients, &blocked);

    if survivors.is_empty() {
        persistence
            .complete_delivery(
                &delivery.id,
                shared::DeliveryStatus::Failed,
                shared::dto::webhook::DeliveryResponseData {
                    error: Some("ALL_RECIPIENTS_BLOCKED".to_string()),
                    failed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
        return Ok(());
    }

    if is_forwarding_loop(&survivors, &email.recipient) {
        persistence
            .complete_delivery(
                &delivery.id,
                shared::DeliveryStatus::Failed,
                shared::dto::webhook::DeliveryResponseData {
                    error: Some("FORWARDING_LOOP_DETECTED".to_string()),
                    failed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
        return Ok(());
    }

    let from_address = from_override.unwrap_or_else(|| email.recipient.clone());

    let tenant = match domain_of(&from_address) {
        Some(domain) => persistence
            .get_tenant_identity_for_domain(domain)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(%domain, error = %err, "tenant identity lookup failed, proceeding without it");
                None
            }),
        None => None,
    }
    .unwrap_or_default();

    let handoff = OutboundHandoff {
        parsed_email: email,
        from_address: from_address.clone(),
        to_addresses: survivors.clone(),
        subject_prefix,
        include_attachments,
        sender_name,
        source_arn: tenant.source_arn,
        configuration_set_name: tenant.configuration_set_name,
        tenant_name: tenant.tenant_name,
    };

    match sender.send(handoff).await {
        Ok(()) => {
            persistence
                .complete_delivery(
                    &delivery.id,
                    shared::DeliveryStatus::Success,
                    shared::dto::webhook::DeliveryResponseData {
                        to_addresses: Some(survivors),
                        from_address: Some(from_address),
                        forwarded_at: Some(Utc::now()),
                        ..Default::default()
                    },
                )
                .await
        }
        Err(reason) => {
            persistence
                .complete_delivery(
                    &delivery.id,
                    shared::DeliveryStatus::Failed,
                    shared::dto::webhook::DeliveryResponseData {
                        error: Some(reason),
                        failed_at: Some(Utc::now()),
                        ..Default::default()
                    },
                )
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_blocked_is_case_insensitive_and_order_preserving() {
        let recipients = vec![
            "alice@z.com".to_string(),
            "dead@z.com".to_string(),
            "bob@z.com".to_string(),
        ];
        let blocked = vec!["Dead@Z.com".to_string()];

        assert_eq!(
            filter_blocked(&recipients, &blocked),
            vec!["alice@z.com".to_string(), "bob@z.com".to_string()]
        );
    }

    #[test]
    fn loop_detection_matches_trimmed_lowercased_inbound_recipient() {
        let recipients = vec![" Bot@A.com ".to_string()];
        assert!(is_forwarding_loop(&recipients, "bot@a.com"));
        assert!(!is_forwarding_loop(&[String::from("alice@a.com")], "bot@a.com"));
    }

    #[test]
    fn domain_of_splits_on_last_at() {
        assert_eq!(domain_of("alice@sub.example.com"), Some("sub.example.com"));
        assert_eq!(domain_of("not-an-address"), None);
    }
}
