//! Records a parsed DSN as a `email_delivery_event`, resolves it back to the
//! originating `sent_email`/user/domain/tenant, and auto-blocklists hard
//! bounces (C6).

use chrono::Utc;
use entity::email_delivery_event;
use nanoid::nanoid;
use shared::{BounceSubType, BounceType, DeliveryEventActionTaken};

use crate::dsn::{self, Classification, ParsedDsn};
use crate::errors::PipelineError;
use crate::persistence::Persistence;

/// Outcome of recording one DSN: whether it was a no-op (already processed)
/// and, if not, whether a hard bounce added a new blocklist entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    pub already_processed: bool,
    pub event_id: Option<String>,
    pub added_to_blocklist: bool,
}

/// Parses `raw` as a DSN (caller has already confirmed `dsn::is_dsn`) and
/// records the result against `dsn_email_id`, the raw-blob key of the
/// inbound DSN message itself (used for idempotent re-ingestion: a DSN
/// redelivered by the upstream gateway is a no-op).
pub async fn record(
    persistence: &dyn Persistence,
    dsn_email_id: &str,
    raw: &[u8],
    received_at: chrono::DateTime<Utc>,
) -> Result<RecordOutcome, PipelineError> {
    if persistence
        .find_delivery_event_by_dsn_email_id(dsn_email_id)
        .await?
        .is_some()
    {
        return Ok(RecordOutcome {
            already_processed: true,
            event_id: None,
            added_to_blocklist: false,
        });
    }

    let Some(parsed) = dsn::parse(raw) else {
        return Err(PipelineError::Unprocessable(
            "DSN marker matched but no message/delivery-status part found".to_string(),
        ));
    };

    let classification = parsed
        .recipient
        .status
        .as_deref()
        .map(|status| dsn::classify(status, parsed.recipient.diagnostic_code.as_deref()))
        .unwrap_or(Classification {
            status_class: 0,
            status_category: 0,
            bounce_type: BounceType::Soft,
            bounce_sub_type: BounceSubType::Unknown,
        });

    let (original_sent_email_id, user_id, domain_id, domain_name, tenant_id, tenant_name) =
        resolve_source(persistence, &parsed).await?;

    let event = build_event(
        dsn_email_id,
        raw,
        received_at,
        &parsed,
        classification,
        original_sent_email_id,
        user_id.clone(),
        domain_id.clone(),
        domain_name,
        tenant_id,
        tenant_name,
    );

    let inserted = persistence.insert_delivery_event(event).await?;

    let added_to_blocklist = if classification.bounce_type == BounceType::Hard {
        maybe_blocklist(persistence, &inserted, user_id, domain_id).await?
    } else {
        false
    };

    Ok(RecordOutcome {
        already_processed: false,
        event_id: Some(inserted.id),
        added_to_blocklist,
    })
}

/// Resolves the DSN back to the `sent_email` it bounced, and through it to
/// user/domain/tenant, per spec.md §4.5's four-variant probe.
async fn resolve_source(
    persistence: &dyn Persistence,
    parsed: &ParsedDsn,
) -> Result<
    (
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
    ),
    PipelineError,
> {
    let Some(bare_id) = dsn::trigger_message_id(parsed) else {
        return Ok((None, None, None, None, None, None));
    };

    let variants = dsn::candidate_variants(&bare_id);

    let Some(sent) = persistence
        .find_sent_email_by_message_id_candidates(&variants)
        .await?
    else {
        return Ok((None, None, None, None, None, None));
    };

    let domain = match &sent.from_domain {
        Some(d) => persistence.get_email_domain_by_name(d, &sent.user_id).await?,
        None => None,
    };

    let (domain_id, domain_name, tenant_id) = match &domain {
        Some(d) => (Some(d.id.clone()), Some(d.domain.clone()), d.tenant_id.clone()),
        None => (None, None, None),
    };

    Ok((
        Some(sent.id),
        Some(sent.user_id.clone()),
        domain_id,
        domain_name,
        tenant_id,
        None,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_event(
    dsn_email_id: &str,
    raw: &[u8],
    received_at: chrono::DateTime<Utc>,
    parsed: &ParsedDsn,
    classification: Classification,
    original_sent_email_id: Option<String>,
    user_id: Option<String>,
    domain_id: Option<String>,
    domain_name: Option<String>,
    tenant_id: Option<String>,
    tenant_name: Option<String>,
) -> email_delivery_event::Model {
    let now = Utc::now();

    email_delivery_event::Model {
        id: nanoid!(),
        event_type: parsed.recipient.action.clone().unwrap_or_else(|| "failed".to_string()),
        bounce_type: Some(classification.bounce_type),
        bounce_sub_type: Some(classification.bounce_sub_type),
        status_code: parsed.recipient.status.clone(),
        status_class: Some(classification.status_class),
        status_category: Some(classification.status_category),
        diagnostic_code: parsed.recipient.diagnostic_code.clone(),
        failed_recipient: parsed.recipient.final_recipient.clone(),
        failed_recipient_domain: parsed
            .recipient
            .final_recipient
            .as_deref()
            .and_then(|r| r.rsplit_once('@'))
            .map(|(_, domain)| domain.to_string()),
        original_message_id: parsed.original.message_id.clone(),
        original_sent_email_id,
        original_from: parsed.original.from.clone(),
        original_to: parsed.original.to.clone(),
        original_subject: parsed.original.subject.clone(),
        original_sent_at: None,
        dsn_email_id: Some(dsn_email_id.to_string()),
        dsn_received_at: Some(received_at),
        reporting_mta: parsed.report.reporting_mta.clone(),
        remote_mta: parsed.recipient.remote_mta.clone(),
        user_id,
        domain_id,
        domain_name,
        tenant_id,
        tenant_name,
        action_taken: DeliveryEventActionTaken::None,
        added_to_blocklist: false,
        blocklist_id: None,
        raw_dsn_content: Some(String::from_utf8_lossy(raw).to_string()),
        created_at: now,
    }
}

/// Auto-blocklists a hard-bounced recipient when both `userId` and
/// `domainId` resolved, unless already blocked. Returns whether a new
/// blocklist row was created.
async fn maybe_blocklist(
    persistence: &dyn Persistence,
    event: &email_delivery_event::Model,
    user_id: Option<String>,
    domain_id: Option<String>,
) -> Result<bool, PipelineError> {
    let (Some(_user_id), Some(domain_id)) = (user_id, domain_id) else {
        return Ok(false);
    };

    let Some(recipient) = event.failed_recipient.clone() else {
        return Ok(false);
    };

    if persistence
        .get_blocked_email_for_domain(&recipient.to_lowercase(), &domain_id)
        .await?
        .is_some()
    {
        return Ok(false);
    }

    let reason = format!(
        "Hard bounce: {} ({})",
        event.bounce_sub_type.map(|t| t.to_string()).unwrap_or_else(|| "unknown".to_string()),
        event.status_code.as_deref().unwrap_or("unknown")
    );

    let blocked = persistence
        .insert_blocked_email(&recipient.to_lowercase(), &domain_id, &reason, "system")
        .await?;

    persistence
        .mark_delivery_event_blocklisted(&event.id, &blocked.id)
        .await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounce_type_hard_triggers_blocklist_eligibility_only_with_both_ids() {
        // Pure routing check: the gate itself lives in `maybe_blocklist`,
        // exercised end-to-end in the pipeline's own tests against a fake
        // persistence. Here we just confirm the classification feeding it
        // recognizes 5.1.1 as hard, the scenario spec.md §8 S6 names.
        let c = dsn::classify("5.1.1", None);
        assert_eq!(c.bounce_type, BounceType::Hard);
    }
}
