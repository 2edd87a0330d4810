pub mod constants;
pub mod dto;
pub mod tracer;

use sea_orm::DeriveActiveEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Kind of endpoint a `structured_email` or `sent_email` can be delivered through.
///
/// Also the native ENUM for the `endpoint_delivery.delivery_type` column.
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "delivery_type")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    #[sea_orm(string_value = "webhook")]
    Webhook,
    #[sea_orm(string_value = "email_forward")]
    EmailForward,
}

/// Status of a single `endpoint_delivery` attempt.
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "delivery_status")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Status of an outbound `sent_email`.
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "sent_email_status")]
#[serde(rename_all = "snake_case")]
pub enum SentEmailStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// What a user-configured endpoint delivers to.
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "endpoint_type")]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    #[sea_orm(string_value = "webhook")]
    Webhook,
    #[sea_orm(string_value = "email")]
    Email,
    #[sea_orm(string_value = "email_group")]
    EmailGroup,
}

/// Envelope shape used to flatten a webhook payload for a specific receiver.
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "webhook_format")]
#[serde(rename_all = "snake_case")]
pub enum WebhookFormat {
    #[sea_orm(string_value = "inbound")]
    Inbound,
    #[sea_orm(string_value = "discord")]
    Discord,
    #[sea_orm(string_value = "slack")]
    Slack,
}

/// Kind of a `guard_rule`; only `Explicit` is evaluated, `AiPrompt` rules
/// are loaded but never match (see core::guard).
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "guard_rule_type")]
#[serde(rename_all = "snake_case")]
pub enum GuardRuleType {
    #[sea_orm(string_value = "explicit")]
    Explicit,
    #[sea_orm(string_value = "ai_prompt")]
    AiPrompt,
}

/// The three dispositive actions a guard rule's `actions.action` can hold.
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "guard_rule_action")]
#[serde(rename_all = "snake_case")]
pub enum GuardRuleAction {
    #[sea_orm(string_value = "allow")]
    Allow,
    #[sea_orm(string_value = "block")]
    Block,
    #[sea_orm(string_value = "route")]
    Route,
}

/// The full range of values `structured_email.guard_action` can take once
/// stamped by the pipeline. Only `Block` and `Route` are dispositive; the
/// rest stamp metadata only.
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "structured_email_guard_action")]
#[serde(rename_all = "snake_case")]
pub enum StructuredEmailGuardAction {
    #[sea_orm(string_value = "allow")]
    Allow,
    #[sea_orm(string_value = "block")]
    Block,
    #[sea_orm(string_value = "route")]
    Route,
    #[sea_orm(string_value = "flag")]
    Flag,
    #[sea_orm(string_value = "label")]
    Label,
}

impl From<GuardRuleAction> for StructuredEmailGuardAction {
    fn from(value: GuardRuleAction) -> Self {
        match value {
            GuardRuleAction::Allow => Self::Allow,
            GuardRuleAction::Block => Self::Block,
            GuardRuleAction::Route => Self::Route,
        }
    }
}

/// Verification status of a `email_domain`.
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "domain_status")]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "verified")]
    Verified,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Outcome of processing a `email_delivery_event` (bounce/complaint).
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "delivery_event_action_taken")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryEventActionTaken {
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "added_to_blocklist")]
    AddedToBlocklist,
}

/// RFC-3463 bounce classification for a `email_delivery_event`.
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "bounce_type")]
#[serde(rename_all = "snake_case")]
pub enum BounceType {
    #[sea_orm(string_value = "hard")]
    Hard,
    #[sea_orm(string_value = "soft")]
    Soft,
    #[sea_orm(string_value = "transient")]
    Transient,
}

/// A fixed taxonomy of bounce sub-reasons, derived from the enhanced status
/// code and diagnostic text (see core::dsn).
#[derive(
    Eq, Clone, Copy, Debug, Display, EnumIter, Serialize, PartialEq, Deserialize, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "bounce_sub_type")]
#[serde(rename_all = "snake_case")]
pub enum BounceSubType {
    #[sea_orm(string_value = "user_unknown")]
    UserUnknown,
    #[sea_orm(string_value = "bad_destination")]
    BadDestination,
    #[sea_orm(string_value = "mailbox_disabled")]
    MailboxDisabled,
    #[sea_orm(string_value = "mailbox_full")]
    MailboxFull,
    #[sea_orm(string_value = "message_too_large")]
    MessageTooLarge,
    #[sea_orm(string_value = "invalid_domain")]
    InvalidDomain,
    #[sea_orm(string_value = "policy_rejection")]
    PolicyRejection,
    #[sea_orm(string_value = "content_rejected")]
    ContentRejected,
    #[sea_orm(string_value = "dns_failure")]
    DnsFailure,
    #[sea_orm(string_value = "delivery_timeout")]
    DeliveryTimeout,
    #[sea_orm(string_value = "connection_failed")]
    ConnectionFailed,
    #[sea_orm(string_value = "general_failure")]
    GeneralFailure,
    #[sea_orm(string_value = "unknown")]
    Unknown,
    #[sea_orm(string_value = "suppression_list")]
    SuppressionList,
}
