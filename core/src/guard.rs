//! Priority-ordered explicit guard rule evaluation (C2).
//!
//! Rules fail open at every step: a malformed config, a rule with no
//! present sub-predicate, or any persistence error all fall through to
//! `allow` rather than blocking mail flow.

use entity::{guard_rule, structured_email};
use shared::dto::guard::{ExplicitRuleConfig, MatchOperator, ValueListPredicate};
use shared::{GuardRuleAction, GuardRuleType};

use crate::persistence::Persistence;

/// Result of evaluating a user's guard rules against one parsed email.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardVerdict {
    pub action: GuardRuleAction,
    pub matched_rule_id: Option<String>,
    pub route_to_endpoint_id: Option<String>,
}

impl GuardVerdict {
    fn allow() -> Self {
        GuardVerdict {
            action: GuardRuleAction::Allow,
            matched_rule_id: None,
            route_to_endpoint_id: None,
        }
    }
}

/// Evaluates `user_id`'s active guard rules, highest `priority` first,
/// against `email`. On the first match, increments the rule's
/// `trigger_count` and stamps `last_triggered_at` before returning its
/// action.
pub async fn evaluate(
    persistence: &dyn Persistence,
    email: &structured_email::Model,
    user_id: &str,
) -> GuardVerdict {
    let rules = match persistence.get_active_guard_rules(user_id).await {
        Ok(rules) => rules,
        Err(_) => return GuardVerdict::allow(),
    };

    let mut ordered = rules;
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    for rule in ordered {
        if rule.r#type != GuardRuleType::Explicit {
            // AI-prompt rules are out of scope; never match.
            continue;
        }

        if rule_matches(&rule.config, email) {
            let _ = persistence.record_guard_rule_trigger(&rule.id).await;

            return disposition(&rule);
        }
    }

    GuardVerdict::allow()
}

/// A rule matches when every *present* sub-predicate in its config matches.
/// A config with no present sub-predicate never matches.
fn rule_matches(config: &ExplicitRuleConfig, email: &structured_email::Model) -> bool {
    if !config.has_any_predicate() {
        return false;
    }

    if let Some(subject_pred) = &config.subject {
        if !subject_matches(subject_pred, email.subject.as_deref().unwrap_or("")) {
            return false;
        }
    }

    if let Some(from_pred) = &config.from {
        if !from_matches(from_pred, email) {
            return false;
        }
    }

    if let Some(expected) = config.has_attachment {
        if (!email.attachments.is_empty()) != expected {
            return false;
        }
    }

    if let Some(words_pred) = &config.has_words {
        let body = format!(
            "{} {}",
            email.text_body.as_deref().unwrap_or(""),
            email.html_body.as_deref().unwrap_or("")
        )
        .to_lowercase();

        if !words_matches(words_pred, &body) {
            return false;
        }
    }

    true
}

fn subject_matches(predicate: &ValueListPredicate, subject: &str) -> bool {
    let subject = subject.to_lowercase();
    matches_value_list(predicate, |value| subject.contains(&value.to_lowercase()))
}

fn words_matches(predicate: &ValueListPredicate, lowercased_body: &str) -> bool {
    matches_value_list(predicate, |value| lowercased_body.contains(&value.to_lowercase()))
}

/// `from` patterns match either by exact lowercased equality, or, when a
/// pattern begins with `*@`, by domain-suffix match against any address on
/// the email (`*@example.com` matches `alice@example.com` but not
/// `alice@sub.example.com`).
fn from_matches(predicate: &ValueListPredicate, email: &structured_email::Model) -> bool {
    let addresses = email.from_data.lowercased_addresses();

    matches_value_list(predicate, |pattern| {
        let pattern = pattern.to_lowercase();

        addresses.iter().any(|address| {
            if let Some(domain) = pattern.strip_prefix("*@") {
                address
                    .rsplit_once('@')
                    .map(|(_, addr_domain)| addr_domain == domain)
                    .unwrap_or(false)
            } else {
                address == &pattern
            }
        })
    })
}

fn matches_value_list(predicate: &ValueListPredicate, mut pred: impl FnMut(&str) -> bool) -> bool {
    if predicate.values.is_empty() {
        return false;
    }

    match predicate.operator {
        MatchOperator::Or => predicate.values.iter().any(|v| pred(v)),
        MatchOperator::And => predicate.values.iter().all(|v| pred(v)),
    }
}

fn disposition(rule: &guard_rule::Model) -> GuardVerdict {
    match rule.actions.action {
        GuardRuleAction::Route => {
            if let Some(endpoint_id) = rule.actions.endpoint_id.clone() {
                GuardVerdict {
                    action: GuardRuleAction::Route,
                    matched_rule_id: Some(rule.id.clone()),
                    route_to_endpoint_id: Some(endpoint_id),
                }
            } else {
                // Missing endpointId on a `route` action downgrades to
                // `allow`, fail-open, per spec.md §4.6.
                GuardVerdict {
                    action: GuardRuleAction::Allow,
                    matched_rule_id: Some(rule.id.clone()),
                    route_to_endpoint_id: None,
                }
            }
        }
        other => GuardVerdict {
            action: other,
            matched_rule_id: Some(rule.id.clone()),
            route_to_endpoint_id: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::dto::email::{AddressList, AttachmentList, EmailAddressData, Headers, MessageIdList};
    use shared::dto::guard::RuleActionConfig;
    use chrono::Utc;

    fn sample_email(subject: &str, from: &str) -> structured_email::Model {
        structured_email::Model {
            id: "e1".into(),
            email_id: "raw1".into(),
            user_id: "u1".into(),
            message_id: None,
            date: None,
            subject: Some(subject.to_string()),
            recipient: "support@a.com".into(),
            from_data: AddressList::new(vec![EmailAddressData {
                name: None,
                address: from.to_string(),
            }]),
            to_data: AddressList::default(),
            cc_data: AddressList::default(),
            bcc_data: AddressList::default(),
            reply_to_data: AddressList::default(),
            in_reply_to: None,
            references: MessageIdList::default(),
            text_body: Some("hello world".into()),
            html_body: None,
            raw_content: None,
            attachments: AttachmentList::default(),
            headers: Headers::default(),
            priority: None,
            parse_success: true,
            parse_error: None,
            thread_id: None,
            thread_position: None,
            guard_blocked: false,
            guard_reason: None,
            guard_action: None,
            guard_rule_id: None,
            guard_metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            read_at: None,
        }
    }

    fn rule(priority: i32, config: ExplicitRuleConfig, action: GuardRuleAction) -> guard_rule::Model {
        guard_rule::Model {
            id: format!("r{priority}"),
            user_id: "u1".into(),
            name: "rule".into(),
            r#type: GuardRuleType::Explicit,
            is_active: true,
            priority,
            config,
            actions: RuleActionConfig {
                action,
                endpoint_id: None,
            },
            trigger_count: 0,
            last_triggered_at: None,
        }
    }

    #[test]
    fn has_words_and_requires_every_value() {
        let pred = ValueListPredicate {
            values: vec!["a".into(), "b".into()],
            operator: MatchOperator::And,
        };

        assert!(words_matches(&pred, "a b"));
        assert!(!words_matches(&pred, "a"));
    }

    #[test]
    fn from_wildcard_matches_exact_domain_only() {
        let pred = ValueListPredicate {
            values: vec!["*@example.com".into()],
            operator: MatchOperator::Or,
        };

        let matching = sample_email("hi", "alice@example.com");
        let non_matching = sample_email("hi", "alice@sub.example.com");

        assert!(from_matches(&pred, &matching));
        assert!(!from_matches(&pred, &non_matching));
    }

    #[test]
    fn empty_config_never_matches() {
        let email = sample_email("Invoice #42", "alice@example.com");
        assert!(!rule_matches(&ExplicitRuleConfig::default(), &email));
    }

    #[test]
    fn disposition_downgrades_route_without_endpoint_to_allow() {
        let r = rule(
            100,
            ExplicitRuleConfig {
                subject: Some(ValueListPredicate {
                    values: vec!["invoice".into()],
                    operator: MatchOperator::Or,
                }),
                ..Default::default()
            },
            GuardRuleAction::Route,
        );

        let verdict = disposition(&r);
        assert_eq!(verdict.action, GuardRuleAction::Allow);
        assert_eq!(verdict.route_to_endpoint_id, None);
    }
}
