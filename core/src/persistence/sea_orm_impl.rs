//! `sea-orm`-backed implementation of `Persistence` (C9) against the
//! Postgres schema in `migration`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::{
    blocked_email, email_address, email_delivery_event, email_domain, email_thread, endpoint,
    endpoint_delivery, guard_rule, sent_email, structured_email, webhook,
};
use nanoid::nanoid;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use shared::dto::endpoint::EndpointConfig;
use shared::dto::webhook::DeliveryResponseData;
use shared::{DeliveryStatus, DeliveryType};

use crate::errors::PipelineError;
use crate::forwarder::TenantIdentity;
use crate::persistence::Persistence;

/// `Persistence` over a live `DatabaseConnection`. Holds no state of its
/// own beyond the pool sea-orm already manages.
pub struct SeaOrmPersistence {
    db: DatabaseConnection,
}

impl SeaOrmPersistence {
    pub fn new(db: DatabaseConnection) -> Self {
        SeaOrmPersistence { db }
    }
}

fn db_err(err: sea_orm::DbErr) -> PipelineError {
    PipelineError::from_db_err(err, "")
}

#[async_trait]
impl Persistence for SeaOrmPersistence {
    async fn get_structured_email(
        &self,
        id_or_email_id: &str,
    ) -> Result<Option<structured_email::Model>, PipelineError> {
        structured_email::Entity::find()
            .filter(
                Condition::any()
                    .add(structured_email::Column::Id.eq(id_or_email_id))
                    .add(structured_email::Column::EmailId.eq(id_or_email_id)),
            )
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn save_structured_email(
        &self,
        model: structured_email::Model,
    ) -> Result<structured_email::Model, PipelineError> {
        let mut am: structured_email::ActiveModel = model.into();
        am.updated_at = Set(Utc::now());
        am.update(&self.db).await.map_err(db_err)
    }

    async fn mark_read(&self, structured_email_id: &str) -> Result<(), PipelineError> {
        let am = structured_email::ActiveModel {
            id: Set(structured_email_id.to_string()),
            read_at: Set(Some(Utc::now())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        am.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn get_email_domain_by_name(
        &self,
        domain: &str,
        user_id: &str,
    ) -> Result<Option<email_domain::Model>, PipelineError> {
        email_domain::Entity::find()
            .filter(email_domain::Column::Domain.eq(domain))
            .filter(email_domain::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_email_domain_by_id(
        &self,
        id: &str,
    ) -> Result<Option<email_domain::Model>, PipelineError> {
        email_domain::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_email_address(
        &self,
        address: &str,
        user_id: &str,
    ) -> Result<Option<email_address::Model>, PipelineError> {
        email_address::Entity::find()
            .filter(email_address::Column::Address.eq(address))
            .filter(email_address::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_active_guard_rules(
        &self,
        user_id: &str,
    ) -> Result<Vec<guard_rule::Model>, PipelineError> {
        guard_rule::Entity::find()
            .filter(guard_rule::Column::UserId.eq(user_id))
            .filter(guard_rule::Column::IsActive.eq(true))
            .order_by(guard_rule::Column::Priority, Order::Desc)
            .all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn record_guard_rule_trigger(&self, rule_id: &str) -> Result<(), PipelineError> {
        let rule = guard_rule::Entity::find_by_id(rule_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| PipelineError::NotFound(format!("guard_rule {rule_id}")))?;

        let mut am: guard_rule::ActiveModel = rule.into();
        am.trigger_count = Set(am.trigger_count.unwrap() + 1);
        am.last_triggered_at = Set(Some(Utc::now()));
        am.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn get_endpoint(&self, id: &str) -> Result<Option<endpoint::Model>, PipelineError> {
        endpoint::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_webhook(&self, id: &str) -> Result<Option<webhook::Model>, PipelineError> {
        webhook::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn set_endpoint_verification_token_if_absent(
        &self,
        endpoint_id: &str,
        token: &str,
    ) -> Result<String, PipelineError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let row = endpoint::Entity::find_by_id(endpoint_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| PipelineError::NotFound(format!("endpoint {endpoint_id}")))?;

        let EndpointConfig::Webhook(mut config) = row.config.clone() else {
            return Err(PipelineError::Fatal(format!(
                "endpoint {endpoint_id} has no webhook config to carry a verification token"
            )));
        };

        let effective = match &config.verification_token {
            Some(existing) => existing.clone(),
            None => {
                config.verification_token = Some(token.to_string());
                let mut am: endpoint::ActiveModel = row.into();
                am.config = Set(EndpointConfig::Webhook(config));
                am.update(&txn).await.map_err(db_err)?;
                token.to_string()
            }
        };

        txn.commit().await.map_err(db_err)?;
        Ok(effective)
    }

    async fn set_webhook_verification_token_if_absent(
        &self,
        webhook_id: &str,
        token: &str,
    ) -> Result<String, PipelineError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let row = webhook::Entity::find_by_id(webhook_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| PipelineError::NotFound(format!("webhook {webhook_id}")))?;

        let effective = match &row.verification_token {
            Some(existing) => existing.clone(),
            None => {
                let mut am: webhook::ActiveModel = row.into();
                am.verification_token = Set(Some(token.to_string()));
                am.update(&txn).await.map_err(db_err)?;
                token.to_string()
            }
        };

        txn.commit().await.map_err(db_err)?;
        Ok(effective)
    }

    async fn get_endpoint_delivery(
        &self,
        email_id: &str,
        endpoint_id: &str,
    ) -> Result<Option<endpoint_delivery::Model>, PipelineError> {
        endpoint_delivery::Entity::find()
            .filter(endpoint_delivery::Column::EmailId.eq(email_id))
            .filter(endpoint_delivery::Column::EndpointId.eq(endpoint_id))
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn create_pending_delivery(
        &self,
        email_id: &str,
        endpoint_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<endpoint_delivery::Model, PipelineError> {
        let now = Utc::now();
        let am = endpoint_delivery::ActiveModel {
            id: Set(nanoid!()),
            email_id: Set(email_id.to_string()),
            endpoint_id: Set(endpoint_id.to_string()),
            delivery_type: Set(delivery_type),
            status: Set(DeliveryStatus::Pending),
            attempts: Set(1),
            last_attempt_at: Set(Some(now)),
            response_data: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        am.insert(&self.db)
            .await
            .map_err(|e| PipelineError::from_db_err(e, "endpoint_delivery_email_id_endpoint_id_key"))
    }

    async fn complete_delivery(
        &self,
        id: &str,
        status: DeliveryStatus,
        response: DeliveryResponseData,
    ) -> Result<(), PipelineError> {
        let am = endpoint_delivery::ActiveModel {
            id: Set(id.to_string()),
            status: Set(status),
            response_data: Set(Some(response)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        am.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn find_earliest_in_thread(
        &self,
        thread_id: &str,
    ) -> Result<Option<structured_email::Model>, PipelineError> {
        structured_email::Entity::find()
            .filter(structured_email::Column::ThreadId.eq(thread_id))
            .order_by_asc(structured_email::Column::ThreadPosition)
            .order_by_asc(structured_email::Column::Date)
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_blocked_email(
        &self,
        address: &str,
    ) -> Result<Option<blocked_email::Model>, PipelineError> {
        blocked_email::Entity::find()
            .filter(blocked_email::Column::EmailAddress.eq(address))
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_blocked_email_for_domain(
        &self,
        address: &str,
        domain_id: &str,
    ) -> Result<Option<blocked_email::Model>, PipelineError> {
        blocked_email::Entity::find()
            .filter(blocked_email::Column::EmailAddress.eq(address))
            .filter(blocked_email::Column::DomainId.eq(domain_id))
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    /// Resolves `tenant_id` via `email_domain`, walking up one level to
    /// `parent_domain` when the domain row itself has none. The wider SES
    /// sending identity (`source_arn`/`configuration_set_name`) lives in an
    /// account-level tenant directory this schema does not model; a real
    /// deployment resolves those from `tenant_id` through that directory.
    async fn get_tenant_identity_for_domain(
        &self,
        domain: &str,
    ) -> Result<Option<TenantIdentity>, PipelineError> {
        let Some(row) = email_domain::Entity::find()
            .filter(email_domain::Column::Domain.eq(domain))
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let tenant_id = match row.tenant_id {
            Some(id) => Some(id),
            None => match &row.parent_domain {
                Some(parent) => {
                    email_domain::Entity::find()
                        .filter(email_domain::Column::Domain.eq(parent))
                        .filter(email_domain::Column::UserId.eq(&row.user_id))
                        .one(&self.db)
                        .await
                        .map_err(db_err)?
                        .and_then(|parent_row| parent_row.tenant_id)
                }
                None => None,
            },
        };

        Ok(tenant_id.map(|id| TenantIdentity {
            tenant_name: Some(id),
            source_arn: None,
            configuration_set_name: None,
        }))
    }

    async fn insert_blocked_email(
        &self,
        email_address: &str,
        domain_id: &str,
        reason: &str,
        blocked_by: &str,
    ) -> Result<blocked_email::Model, PipelineError> {
        let am = blocked_email::ActiveModel {
            id: Set(nanoid!()),
            email_address: Set(email_address.to_string()),
            domain_id: Set(domain_id.to_string()),
            reason: Set(Some(reason.to_string())),
            blocked_by: Set(blocked_by.to_string()),
            created_at: Set(Utc::now()),
        };

        am.insert(&self.db)
            .await
            .map_err(|e| PipelineError::from_db_err(e, "blocked_email_email_address_domain_id_key"))
    }

    async fn find_sent_email_by_message_id_candidates(
        &self,
        candidates: &[String],
    ) -> Result<Option<sent_email::Model>, PipelineError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        sent_email::Entity::find()
            .filter(
                Condition::any()
                    .add(sent_email::Column::MessageId.is_in(candidates.to_vec()))
                    .add(sent_email::Column::SesMessageId.is_in(candidates.to_vec())),
            )
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn insert_delivery_event(
        &self,
        model: email_delivery_event::Model,
    ) -> Result<email_delivery_event::Model, PipelineError> {
        let am: email_delivery_event::ActiveModel = model.into();
        am.insert(&self.db)
            .await
            .map_err(|e| PipelineError::from_db_err(e, "email_delivery_event_dsn_email_id_key"))
    }

    async fn find_delivery_event_by_dsn_email_id(
        &self,
        dsn_email_id: &str,
    ) -> Result<Option<email_delivery_event::Model>, PipelineError> {
        email_delivery_event::Entity::find()
            .filter(email_delivery_event::Column::DsnEmailId.eq(dsn_email_id))
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn mark_delivery_event_blocklisted(
        &self,
        event_id: &str,
        blocklist_id: &str,
    ) -> Result<(), PipelineError> {
        let am = email_delivery_event::ActiveModel {
            id: Set(event_id.to_string()),
            action_taken: Set(shared::DeliveryEventActionTaken::AddedToBlocklist),
            added_to_blocklist: Set(true),
            blocklist_id: Set(Some(blocklist_id.to_string())),
            ..Default::default()
        };

        am.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn count_sent_emails_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, PipelineError> {
        let count = sent_email::Entity::find()
            .filter(sent_email::Column::UserId.eq(user_id))
            .filter(sent_email::Column::CreatedAt.gte(from))
            .filter(sent_email::Column::CreatedAt.lt(to))
            .count(&self.db)
            .await
            .map_err(db_err)?;

        Ok(count as i64)
    }

    async fn list_sender_user_ids_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, PipelineError> {
        let ids: Vec<String> = sent_email::Entity::find()
            .select_only()
            .column(sent_email::Column::UserId)
            .filter(sent_email::Column::CreatedAt.gte(since))
            .distinct()
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(ids)
    }

    async fn find_thread_id_by_message_ids(
        &self,
        user_id: &str,
        candidates: &[String],
    ) -> Result<Option<String>, PipelineError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let from_structured = structured_email::Entity::find()
            .filter(structured_email::Column::UserId.eq(user_id))
            .filter(structured_email::Column::MessageId.is_in(candidates.to_vec()))
            .filter(structured_email::Column::ThreadId.is_not_null())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        if let Some(row) = from_structured {
            return Ok(row.thread_id);
        }

        let from_sent = sent_email::Entity::find()
            .filter(sent_email::Column::UserId.eq(user_id))
            .filter(sent_email::Column::MessageId.is_in(candidates.to_vec()))
            .filter(sent_email::Column::ThreadId.is_not_null())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(from_sent.and_then(|row| row.thread_id))
    }

    async fn find_thread_by_subject_window(
        &self,
        user_id: &str,
        normalized_subject: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<email_thread::Model>, PipelineError> {
        email_thread::Entity::find()
            .filter(email_thread::Column::UserId.eq(user_id))
            .filter(email_thread::Column::NormalizedSubject.eq(normalized_subject))
            .filter(email_thread::Column::LastMessageAt.gte(since))
            .order_by_desc(email_thread::Column::LastMessageAt)
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn get_thread(
        &self,
        thread_id: &str,
    ) -> Result<Option<email_thread::Model>, PipelineError> {
        email_thread::Entity::find_by_id(thread_id)
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn create_thread(
        &self,
        user_id: &str,
        root_message_id: &str,
        normalized_subject: &str,
        participant_emails: Vec<String>,
        last_message_at: DateTime<Utc>,
    ) -> Result<email_thread::Model, PipelineError> {
        let now = Utc::now();
        let am = email_thread::ActiveModel {
            id: Set(nanoid!()),
            user_id: Set(user_id.to_string()),
            root_message_id: Set(root_message_id.to_string()),
            normalized_subject: Set(normalized_subject.to_string()),
            participant_emails: Set(shared::dto::email::ParticipantSet(participant_emails)),
            // The unconditional `attach_structured_email_to_thread` call that
            // immediately follows every `create_thread` assigns the first
            // email position `message_count + 1`; starting at 0 keeps that
            // first assignment `1` instead of double-counting the thread's
            // own creating message.
            message_count: Set(0),
            last_message_at: Set(last_message_at),
            created_at: Set(now),
            updated_at: Set(now),
        };

        am.insert(&self.db).await.map_err(db_err)
    }

    async fn attach_structured_email_to_thread(
        &self,
        thread_id: &str,
        structured_email_id: &str,
        participant_emails: Vec<String>,
        message_at: DateTime<Utc>,
    ) -> Result<i32, PipelineError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let thread = email_thread::Entity::find_by_id(thread_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| PipelineError::NotFound(format!("email_thread {thread_id}")))?;

        let position = thread.message_count + 1;

        let mut participants = thread.participant_emails.clone();
        participants.union_with(participant_emails);

        let mut thread_am: email_thread::ActiveModel = thread.into();
        thread_am.message_count = Set(position);
        thread_am.last_message_at = Set(message_at);
        thread_am.participant_emails = Set(participants);
        thread_am.updated_at = Set(Utc::now());
        thread_am.update(&txn).await.map_err(db_err)?;

        let email_am = structured_email::ActiveModel {
            id: Set(structured_email_id.to_string()),
            thread_id: Set(Some(thread_id.to_string())),
            thread_position: Set(Some(position)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        email_am.update(&txn).await.map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;

        Ok(position)
    }
}
