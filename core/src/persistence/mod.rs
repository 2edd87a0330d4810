mod sea_orm_impl;

pub use sea_orm_impl::SeaOrmPersistence;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::{
    blocked_email, email_address, email_delivery_event, email_domain, email_thread, endpoint,
    endpoint_delivery, guard_rule, sent_email, structured_email, webhook,
};
use shared::dto::webhook::DeliveryResponseData;
use shared::{DeliveryStatus, DeliveryType};

use crate::errors::PipelineError;

/// Typed access to the ten tables the routing pipeline and its
/// collaborators read and write. One method per access pattern actually
/// exercised by C1-C8, rather than a generic repository — every query here
/// exists because some component's algorithm names it.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn get_structured_email(
        &self,
        id_or_email_id: &str,
    ) -> Result<Option<structured_email::Model>, PipelineError>;

    async fn save_structured_email(
        &self,
        model: structured_email::Model,
    ) -> Result<structured_email::Model, PipelineError>;

    async fn mark_read(&self, structured_email_id: &str) -> Result<(), PipelineError>;

    async fn get_email_domain_by_name(
        &self,
        domain: &str,
        user_id: &str,
    ) -> Result<Option<email_domain::Model>, PipelineError>;

    async fn get_email_domain_by_id(
        &self,
        id: &str,
    ) -> Result<Option<email_domain::Model>, PipelineError>;

    async fn get_email_address(
        &self,
        address: &str,
        user_id: &str,
    ) -> Result<Option<email_address::Model>, PipelineError>;

    async fn get_active_guard_rules(
        &self,
        user_id: &str,
    ) -> Result<Vec<guard_rule::Model>, PipelineError>;

    async fn record_guard_rule_trigger(&self, rule_id: &str) -> Result<(), PipelineError>;

    async fn get_endpoint(&self, id: &str) -> Result<Option<endpoint::Model>, PipelineError>;

    async fn get_webhook(&self, id: &str) -> Result<Option<webhook::Model>, PipelineError>;

    /// Compare-and-set: writes `token` into the endpoint's config only if no
    /// token is currently present, then returns whichever token is in
    /// effect (the caller's, or one a racing writer already installed).
    async fn set_endpoint_verification_token_if_absent(
        &self,
        endpoint_id: &str,
        token: &str,
    ) -> Result<String, PipelineError>;

    async fn set_webhook_verification_token_if_absent(
        &self,
        webhook_id: &str,
        token: &str,
    ) -> Result<String, PipelineError>;

    async fn get_endpoint_delivery(
        &self,
        email_id: &str,
        endpoint_id: &str,
    ) -> Result<Option<endpoint_delivery::Model>, PipelineError>;

    /// Inserts the idempotency-lock row. A unique-constraint violation on
    /// `(email_id, endpoint_id)` surfaces as `PipelineError::Duplicate`.
    async fn create_pending_delivery(
        &self,
        email_id: &str,
        endpoint_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<endpoint_delivery::Model, PipelineError>;

    async fn complete_delivery(
        &self,
        id: &str,
        status: DeliveryStatus,
        response: DeliveryResponseData,
    ) -> Result<(), PipelineError>;

    /// The earliest email in a thread: position 1 if present, else the
    /// lowest recorded position, else the earliest by `date`.
    async fn find_earliest_in_thread(
        &self,
        thread_id: &str,
    ) -> Result<Option<structured_email::Model>, PipelineError>;

    async fn get_blocked_email(
        &self,
        address: &str,
    ) -> Result<Option<blocked_email::Model>, PipelineError>;

    /// Same lookup as `get_blocked_email`, scoped to a single `domain_id`.
    /// `blocked_email` is unique per `(emailAddress, domainId)`, so C6's
    /// auto-blocklist check must match the DSN's own resolved domain rather
    /// than any domain the address happens to be blocked on.
    async fn get_blocked_email_for_domain(
        &self,
        address: &str,
        domain_id: &str,
    ) -> Result<Option<blocked_email::Model>, PipelineError>;

    /// Per-tenant SES sending identity for `domain`, falling back to
    /// `parentDomain` one level when `domain` itself has none configured.
    async fn get_tenant_identity_for_domain(
        &self,
        domain: &str,
    ) -> Result<Option<crate::forwarder::TenantIdentity>, PipelineError>;

    async fn insert_blocked_email(
        &self,
        email_address: &str,
        domain_id: &str,
        reason: &str,
        blocked_by: &str,
    ) -> Result<blocked_email::Model, PipelineError>;

    async fn find_sent_email_by_message_id_candidates(
        &self,
        candidates: &[String],
    ) -> Result<Option<sent_email::Model>, PipelineError>;

    async fn insert_delivery_event(
        &self,
        model: email_delivery_event::Model,
    ) -> Result<email_delivery_event::Model, PipelineError>;

    async fn find_delivery_event_by_dsn_email_id(
        &self,
        dsn_email_id: &str,
    ) -> Result<Option<email_delivery_event::Model>, PipelineError>;

    async fn mark_delivery_event_blocklisted(
        &self,
        event_id: &str,
        blocklist_id: &str,
    ) -> Result<(), PipelineError>;

    async fn count_sent_emails_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, PipelineError>;

    /// Distinct `user_id`s with at least one `sent_email` row in the
    /// window, the candidate set the spike-detector cron sweeps.
    async fn list_sender_user_ids_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, PipelineError>;

    /// First `StructuredEmail` or `SentEmail` for this user with a
    /// `messageId` in `candidates` and a non-null `threadId`.
    async fn find_thread_id_by_message_ids(
        &self,
        user_id: &str,
        candidates: &[String],
    ) -> Result<Option<String>, PipelineError>;

    async fn find_thread_by_subject_window(
        &self,
        user_id: &str,
        normalized_subject: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<email_thread::Model>, PipelineError>;

    async fn get_thread(
        &self,
        thread_id: &str,
    ) -> Result<Option<email_thread::Model>, PipelineError>;

    async fn create_thread(
        &self,
        user_id: &str,
        root_message_id: &str,
        normalized_subject: &str,
        participant_emails: Vec<String>,
        last_message_at: DateTime<Utc>,
    ) -> Result<email_thread::Model, PipelineError>;

    /// Transactionally assigns the email `thread_position = message_count +
    /// 1`, bumps `message_count`/`last_message_at`, and unions
    /// `participant_emails`. Returns the assigned position.
    async fn attach_structured_email_to_thread(
        &self,
        thread_id: &str,
        structured_email_id: &str,
        participant_emails: Vec<String>,
        message_at: DateTime<Utc>,
    ) -> Result<i32, PipelineError>;
}

use entity::email_address;
