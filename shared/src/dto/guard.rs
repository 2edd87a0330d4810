//! Typed shape for `guard_rule.config`, keyed on `guard_rule.type`, and for
//! `guard_rule.actions`.

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

use crate::GuardRuleAction;

/// Conjunction/disjunction applied across a predicate's value list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchOperator {
    Or,
    And,
}

impl Default for MatchOperator {
    fn default() -> Self {
        MatchOperator::Or
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueListPredicate {
    pub values: Vec<String>,
    #[serde(default)]
    pub operator: MatchOperator,
}

/// A rule's config is any subset of these four predicates, conjoined: a
/// rule with more than one present predicate matches only when all present
/// predicates match (see `core::guard`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct ExplicitRuleConfig {
    pub subject: Option<ValueListPredicate>,
    pub from: Option<ValueListPredicate>,
    pub has_attachment: Option<bool>,
    pub has_words: Option<ValueListPredicate>,
}

impl ExplicitRuleConfig {
    /// Whether at least one sub-predicate is present; an empty config never
    /// matches.
    pub fn has_any_predicate(&self) -> bool {
        self.subject.is_some()
            || self.from.is_some()
            || self.has_attachment.is_some()
            || self.has_words.is_some()
    }
}

/// `guard_rule.actions`: the disposition applied when this rule is the
/// highest-priority match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct RuleActionConfig {
    pub action: GuardRuleAction,
    pub endpoint_id: Option<String>,
}
