//! RFC-3464 Delivery Status Notification parsing and RFC-3463 enhanced
//! status code classification (C1).
//!
//! MIME traversal (splitting the multipart report into its
//! `message/delivery-status` and `message/rfc822` parts) is delegated to
//! `mail-parser`; everything downstream of that — field extraction,
//! classification, and source resolution — is first-party since that is
//! the part of the system actually in scope.

use mail_parser::{HeaderValue, Message, MessageParser, MimeHeaders, PartType};
use shared::{BounceSubType, BounceType};

/// Per-recipient fields of a `message/delivery-status` part.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DsnRecipientStatus {
    pub action: Option<String>,
    pub final_recipient: Option<String>,
    pub original_recipient: Option<String>,
    pub remote_mta: Option<String>,
    pub diagnostic_code: Option<String>,
    pub status: Option<String>,
    pub last_attempt_date: Option<String>,
    pub will_retry_until: Option<String>,
}

/// The headers that appear once, before the first per-recipient block, in a
/// `message/delivery-status` part.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DsnReportHeader {
    pub reporting_mta: Option<String>,
    pub received_from_mta: Option<String>,
    pub arrival_date: Option<String>,
}

/// Headers recovered from the `message/rfc822` part carrying the original
/// message that bounced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OriginalMessageInfo {
    pub message_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub feedback_id: Option<String>,
}

/// A fully parsed DSN: the report header, the (first) per-recipient status,
/// the original message's headers, and the DSN envelope's own threading
/// headers (which, per spec.md §4.5, are preferred over the embedded
/// original-message headers when resolving the triggering Message-ID).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedDsn {
    pub report: DsnReportHeader,
    pub recipient: DsnRecipientStatus,
    pub original: OriginalMessageInfo,
    pub dsn_in_reply_to: Option<String>,
    pub dsn_references: Vec<String>,
}

/// Substrings that, per spec.md §4.5, identify a raw MIME blob as a DSN
/// even when a full multipart parse is not attempted first.
const DSN_MARKERS: &[&str] = &[
    "Content-Type: multipart/report",
    "report-type=delivery-status",
    "Content-Type: message/delivery-status",
    "MAILER-DAEMON",
    "Delivery Status Notification",
];

/// Whether a raw MIME blob should be treated as a DSN.
pub fn is_dsn(raw: &str) -> bool {
    DSN_MARKERS.iter().any(|marker| raw.contains(marker))
}

/// Parses a raw DSN blob. Returns `None` if the message does not contain a
/// `message/delivery-status` part (i.e. `is_dsn` matched on a marker but the
/// MIME structure turned out not to carry a parseable report — the caller
/// should treat this like any other unparseable inbound message).
pub fn parse(raw: &[u8]) -> Option<ParsedDsn> {
    let message = MessageParser::default().parse(raw)?;

    let mut parsed = ParsedDsn {
        dsn_in_reply_to: header_text(message.in_reply_to()),
        dsn_references: header_text_list(message.references()),
        ..Default::default()
    };

    let mut found_status_part = false;

    for part in &message.parts {
        match part.content_type() {
            Some(ct)
                if ct.ctype() == "message" && ct.subtype() == Some("delivery-status") =>
            {
                if let Some(text) = part.text_contents() {
                    let (header, recipient) = parse_delivery_status_body(text);
                    parsed.report = header;
                    parsed.recipient = recipient;
                    found_status_part = true;
                }
            }
            Some(ct) if ct.ctype() == "message" && ct.subtype() == Some("rfc822") => {
                if let PartType::Message(inner) = &part.body {
                    parsed.original = original_message_info(inner);
                }
            }
            _ => {}
        }
    }

    if !found_status_part {
        return None;
    }

    if parsed.original.message_id.is_none() {
        parsed.original.message_id = message.message_id().map(strip_angle_brackets);
    }

    Some(parsed)
}

fn original_message_info(message: &Message) -> OriginalMessageInfo {
    OriginalMessageInfo {
        message_id: message.message_id().map(strip_angle_brackets),
        from: message
            .from()
            .and_then(|a| a.first())
            .and_then(|a| a.address())
            .map(|s| s.to_string()),
        to: message
            .to()
            .and_then(|a| a.first())
            .and_then(|a| a.address())
            .map(|s| s.to_string()),
        subject: message.subject().map(|s| s.to_string()),
        date: message.header_raw("Date").map(|s| s.trim().to_string()),
        feedback_id: message.header_raw("Feedback-ID").map(|s| s.trim().to_string()),
    }
}

/// Splits a `message/delivery-status` body into its per-message header block
/// and first per-recipient block (RFC 3464 separates the two with a blank
/// line; a DSN with multiple recipients repeats the per-recipient block, but
/// spec.md only asks for "the failed recipient" singular so the first block
/// is taken).
fn parse_delivery_status_body(text: &str) -> (DsnReportHeader, DsnRecipientStatus) {
    let mut blocks = text.split("\n\n");
    let header_block = blocks.next().unwrap_or("");
    let recipient_block = blocks.next().unwrap_or("");

    let mut header = DsnReportHeader::default();
    for (name, value) in field_lines(header_block) {
        match name.as_str() {
            "reporting-mta" => header.reporting_mta = Some(value),
            "received-from-mta" => header.received_from_mta = Some(value),
            "arrival-date" => header.arrival_date = Some(value),
            _ => {}
        }
    }

    let mut recipient = DsnRecipientStatus::default();
    for (name, value) in field_lines(recipient_block) {
        match name.as_str() {
            "action" => recipient.action = Some(value.to_lowercase()),
            "final-recipient" => recipient.final_recipient = Some(strip_rfc822_prefix(&value)),
            "original-recipient" => recipient.original_recipient = Some(strip_rfc822_prefix(&value)),
            "remote-mta" => recipient.remote_mta = Some(value),
            "diagnostic-code" => recipient.diagnostic_code = Some(strip_smtp_prefix(&value)),
            "status" => recipient.status = Some(value),
            "last-attempt-date" => recipient.last_attempt_date = Some(value),
            "will-retry-until" => recipient.will_retry_until = Some(value),
            _ => {}
        }
    }

    (header, recipient)
}

/// Parses `Field-Name: value` lines, lowercasing the field name for
/// case-insensitive matching. Continuation lines (leading whitespace) are
/// appended to the previous field's value.
fn field_lines(block: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in block.lines() {
        if line.starts_with(char::is_whitespace) {
            if let Some((_, value)) = fields.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }

        if let Some((name, value)) = line.split_once(':') {
            fields.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    fields
}

fn strip_rfc822_prefix(value: &str) -> String {
    value
        .split_once(';')
        .map(|(scheme, addr)| {
            if scheme.trim().eq_ignore_ascii_case("rfc822") {
                addr.trim().to_string()
            } else {
                value.trim().to_string()
            }
        })
        .unwrap_or_else(|| value.trim().to_string())
}

fn strip_smtp_prefix(value: &str) -> String {
    value
        .split_once(';')
        .map(|(scheme, rest)| {
            if scheme.trim().eq_ignore_ascii_case("smtp") {
                rest.trim().to_string()
            } else {
                value.trim().to_string()
            }
        })
        .unwrap_or_else(|| value.trim().to_string())
}

fn strip_angle_brackets(value: impl AsRef<str>) -> String {
    value.as_ref().trim().trim_start_matches('<').trim_end_matches('>').to_string()
}

fn header_text(value: &HeaderValue) -> Option<String> {
    match value {
        HeaderValue::Text(s) => Some(strip_angle_brackets(s.as_ref())),
        HeaderValue::TextList(list) => list.first().map(|s| strip_angle_brackets(s.as_ref())),
        _ => None,
    }
}

fn header_text_list(value: &HeaderValue) -> Vec<String> {
    match value {
        HeaderValue::Text(s) => vec![strip_angle_brackets(s.as_ref())],
        HeaderValue::TextList(list) => list.iter().map(|s| strip_angle_brackets(s.as_ref())).collect(),
        _ => Vec::new(),
    }
}

/// RFC-3463 classification of an enhanced status code plus the fixed
/// sub-type taxonomy spec.md §4.5 names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub status_class: i16,
    pub status_category: i16,
    pub bounce_type: BounceType,
    pub bounce_sub_type: BounceSubType,
}

/// Classifies an enhanced status code (`X.Y.Z`) plus optional diagnostic
/// text into a `BounceType`/`BounceSubType` pair.
///
/// Returns `None` if `status` is not a well-formed three-number enhanced
/// code; callers should fall back to `bounce_type = soft`,
/// `bounce_sub_type = unknown` in that case (an email that mentions DSN
/// markers but carries a malformed Status: field is still a bounce, just an
/// unclassifiable one).
pub fn classify(status: &str, diagnostic_code: Option<&str>) -> Classification {
    let parts: Vec<&str> = status.split('.').collect();
    let (class, category, subject) = match parts.as_slice() {
        [c, cat, subj] => (
            c.parse::<i16>().unwrap_or(0),
            cat.parse::<i16>().unwrap_or(0),
            subj.parse::<i16>().unwrap_or(0),
        ),
        _ => (0, 0, 0),
    };

    let bounce_type = match (class, category, subject) {
        (5, 2, 2) => BounceType::Soft,
        (5, 3, 4) => BounceType::Soft,
        (5, _, _) => BounceType::Hard,
        (4, _, _) => BounceType::Transient,
        _ => BounceType::Soft,
    };

    let mut bounce_sub_type = sub_type_for(class, category, subject);

    if diagnostic_code
        .map(|dc| dc.to_lowercase().contains("suppression list"))
        .unwrap_or(false)
    {
        bounce_sub_type = BounceSubType::SuppressionList;
    }

    Classification {
        status_class: class,
        status_category: category,
        bounce_type,
        bounce_sub_type,
    }
}

fn sub_type_for(class: i16, category: i16, subject: i16) -> BounceSubType {
    use BounceSubType::*;

    match (class, category, subject) {
        (5, 1, 1) => UserUnknown,
        (5, 1, 0) => BadDestination,
        (5, 1, 2) => BadDestination,
        (5, 1, 3) => BadDestination,
        (5, 2, 1) => MailboxDisabled,
        (5, 2, 2) => MailboxFull,
        (5, 3, 4) => MessageTooLarge,
        (5, 1, 8) => InvalidDomain,
        (5, 4, 4) => InvalidDomain,
        (5, 7, _) => PolicyRejection,
        (5, 6, _) => ContentRejected,
        (4, 4, 7) => DeliveryTimeout,
        (4, 4, 1) => ConnectionFailed,
        (4, 4, _) => DnsFailure,
        (5, 5, _) => GeneralFailure,
        (5, _, _) => GeneralFailure,
        _ => Unknown,
    }
}

/// Resolves the Message-ID that triggered this DSN, per spec.md §4.5's
/// priority: DSN `In-Reply-To`, first DSN `References` entry, the original
/// message part's `Message-Id`. The result is normalized (no `<>`, no
/// trailing `@...` suffix).
pub fn trigger_message_id(dsn: &ParsedDsn) -> Option<String> {
    let raw = dsn
        .dsn_in_reply_to
        .clone()
        .or_else(|| dsn.dsn_references.first().cloned())
        .or_else(|| dsn.original.message_id.clone())?;

    Some(normalize_triggering_id(&raw))
}

fn normalize_triggering_id(raw: &str) -> String {
    let stripped = raw.trim().trim_start_matches('<').trim_end_matches('>');
    stripped.split_once('@').map(|(bare, _)| bare).unwrap_or(stripped).to_string()
}

/// The four probe variants spec.md §4.5 names for matching against
/// `sent_emails.messageId`/`sesMessageId`.
pub fn candidate_variants(bare_id: &str) -> Vec<String> {
    vec![
        bare_id.to_string(),
        format!("<{bare_id}>"),
        format!("<{bare_id}>@us-east-2.amazonses.com"),
        format!("{bare_id}@us-east-2.amazonses.com"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dsn_by_content_type_marker() {
        assert!(is_dsn("Content-Type: multipart/report; report-type=delivery-status"));
        assert!(is_dsn("From: MAILER-DAEMON@example.com"));
        assert!(!is_dsn("Subject: hello\n\nhi there"));
    }

    #[test]
    fn classifies_user_unknown_as_hard_bounce() {
        let c = classify("5.1.1", None);
        assert_eq!(c.bounce_type, BounceType::Hard);
        assert_eq!(c.bounce_sub_type, BounceSubType::UserUnknown);
        assert_eq!(c.status_class, 5);
        assert_eq!(c.status_category, 1);
    }

    #[test]
    fn mailbox_full_is_soft_despite_5x_class() {
        let c = classify("5.2.2", None);
        assert_eq!(c.bounce_type, BounceType::Soft);
        assert_eq!(c.bounce_sub_type, BounceSubType::MailboxFull);
    }

    #[test]
    fn message_too_large_is_soft() {
        let c = classify("5.3.4", None);
        assert_eq!(c.bounce_type, BounceType::Soft);
        assert_eq!(c.bounce_sub_type, BounceSubType::MessageTooLarge);
    }

    #[test]
    fn transient_4xx_is_transient() {
        let c = classify("4.4.7", None);
        assert_eq!(c.bounce_type, BounceType::Transient);
        assert_eq!(c.bounce_sub_type, BounceSubType::DeliveryTimeout);
    }

    #[test]
    fn suppression_list_diagnostic_overrides_sub_type() {
        let c = classify("5.1.1", Some("550 5.1.1 address is on our suppression list"));
        assert_eq!(c.bounce_sub_type, BounceSubType::SuppressionList);
    }

    #[test]
    fn trigger_id_prefers_in_reply_to_over_references_and_original() {
        let dsn = ParsedDsn {
            dsn_in_reply_to: Some("abc@us-east-2.amazonses.com".to_string()),
            dsn_references: vec!["zzz@example.com".to_string()],
            original: OriginalMessageInfo {
                message_id: Some("yyy@example.com".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        assert_eq!(trigger_message_id(&dsn), Some("abc".to_string()));
    }

    #[test]
    fn candidate_variants_includes_all_four_forms() {
        let variants = candidate_variants("abc");
        assert_eq!(
            variants,
            vec![
                "abc".to_string(),
                "<abc>".to_string(),
                "<abc>@us-east-2.amazonses.com".to_string(),
                "abc@us-east-2.amazonses.com".to_string(),
            ]
        );
    }

    #[test]
    fn strips_rfc822_and_smtp_prefixes() {
        assert_eq!(strip_rfc822_prefix("rfc822;missing@x.com"), "missing@x.com");
        assert_eq!(strip_smtp_prefix("smtp;550 5.1.1 user unknown"), "550 5.1.1 user unknown");
    }
}
