use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        let statement = r#"
        create type "domain_status" as enum ('pending', 'verified', 'failed');
        create type "endpoint_type" as enum ('webhook', 'email', 'email_group');
        create type "webhook_format" as enum ('inbound', 'discord', 'slack');
        create type "guard_rule_type" as enum ('explicit', 'ai_prompt');
        create type "structured_email_guard_action" as enum ('allow', 'block', 'route', 'flag', 'label');
        create type "delivery_type" as enum ('webhook', 'email_forward');
        create type "delivery_status" as enum ('pending', 'success', 'failed');
        create type "sent_email_status" as enum ('pending', 'sent', 'failed');
        create type "bounce_type" as enum ('hard', 'soft', 'transient');
        create type "bounce_sub_type" as enum (
            'user_unknown', 'bad_destination', 'mailbox_disabled', 'mailbox_full',
            'message_too_large', 'invalid_domain', 'policy_rejection', 'content_rejected',
            'dns_failure', 'delivery_timeout', 'connection_failed', 'general_failure',
            'unknown', 'suppression_list'
        );
        create type "delivery_event_action_taken" as enum ('none', 'added_to_blocklist');

        create table "email_domain" (
            "id" varchar(21) primary key,
            "domain" varchar(255) not null,
            "user_id" varchar(21) not null,
            "status" domain_status not null default 'pending',
            "can_receive_emails" boolean not null default false,
            "is_catch_all_enabled" boolean not null default false,
            "catch_all_endpoint_id" varchar(21) null,
            "catch_all_webhook_id" varchar(21) null,
            "receive_dmarc_emails" boolean not null default false,
            "inherits_from_parent" boolean not null default false,
            "parent_domain" varchar(255) null,
            "tenant_id" varchar(21) null
        );

        alter table
            "email_domain"
        add
            constraint "email_domain_user_id_domain_unique" unique ("user_id", "domain");

        create table "webhook" (
            "id" varchar(21) primary key,
            "user_id" varchar(21) not null,
            "url" text not null,
            "secret" varchar(255) null,
            "verification_token" varchar(255) null,
            "is_active" boolean not null default true,
            "created_at" timestamptz not null default now()
        );

        create table "endpoint" (
            "id" varchar(21) primary key,
            "user_id" varchar(21) not null,
            "type" endpoint_type not null,
            "name" varchar(255) not null,
            "description" text null,
            "is_active" boolean not null default true,
            "webhook_format" webhook_format null,
            "config" jsonb not null
        );

        create table "email_address" (
            "id" varchar(21) primary key,
            "address" varchar(320) not null,
            "user_id" varchar(21) not null,
            "domain_id" varchar(21) not null,
            "endpoint_id" varchar(21) null,
            "webhook_id" varchar(21) null,
            "is_active" boolean not null default true
        );

        alter table
            "email_address"
        add
            constraint "email_address_user_id_address_unique" unique ("user_id", "address");

        create table "blocked_email" (
            "id" varchar(21) primary key,
            "email_address" varchar(320) not null,
            "domain_id" varchar(21) not null,
            "reason" text null,
            "blocked_by" varchar(255) not null,
            "created_at" timestamptz not null default now()
        );

        alter table
            "blocked_email"
        add
            constraint "blocked_email_address_domain_unique" unique ("email_address", "domain_id");

        create table "email_thread" (
            "id" varchar(21) primary key,
            "user_id" varchar(21) not null,
            "root_message_id" varchar(998) not null,
            "normalized_subject" varchar(998) not null,
            "participant_emails" jsonb not null default '[]',
            "message_count" integer not null default 0,
            "last_message_at" timestamptz not null,
            "created_at" timestamptz not null default now(),
            "updated_at" timestamptz not null default now()
        );

        create index "email_thread_lookback_idx" on "email_thread" ("user_id", "normalized_subject", "last_message_at");

        create table "guard_rule" (
            "id" varchar(21) primary key,
            "user_id" varchar(21) not null,
            "name" varchar(255) not null,
            "type" guard_rule_type not null,
            "is_active" boolean not null default true,
            "priority" integer not null default 0,
            "config" jsonb not null default '{}',
            "actions" jsonb not null,
            "trigger_count" integer not null default 0,
            "last_triggered_at" timestamptz null
        );

        create index "guard_rule_active_priority_idx" on "guard_rule" ("user_id", "is_active", "priority" desc);

        create table "structured_email" (
            "id" varchar(21) primary key,
            "email_id" varchar(255) not null,
            "user_id" varchar(21) not null,
            "message_id" varchar(998) null,
            "date" timestamptz null,
            "subject" text null,
            "recipient" varchar(320) not null,
            "from_data" jsonb not null default '{}',
            "to_data" jsonb not null default '{}',
            "cc_data" jsonb not null default '{}',
            "bcc_data" jsonb not null default '{}',
            "reply_to_data" jsonb not null default '{}',
            "in_reply_to" varchar(998) null,
            "references" jsonb not null default '[]',
            "text_body" text null,
            "html_body" text null,
            "raw_content" text null,
            "attachments" jsonb not null default '[]',
            "headers" jsonb not null default '{}',
            "priority" varchar(50) null,
            "parse_success" boolean not null,
            "parse_error" text null,
            "thread_id" varchar(21) null,
            "thread_position" integer null,
            "guard_blocked" boolean not null default false,
            "guard_reason" text null,
            "guard_action" structured_email_guard_action null,
            "guard_rule_id" varchar(21) null,
            "guard_metadata" jsonb null,
            "created_at" timestamptz not null default now(),
            "updated_at" timestamptz not null default now(),
            "read_at" timestamptz null
        );

        alter table
            "structured_email"
        add
            constraint "structured_email_email_id_unique" unique ("email_id");

        create index "structured_email_user_recipient_idx" on "structured_email" ("user_id", "recipient");
        create index "structured_email_thread_id_idx" on "structured_email" ("thread_id");

        create table "sent_email" (
            "id" varchar(21) primary key,
            "user_id" varchar(21) not null,
            "message_id" varchar(998) null,
            "ses_message_id" varchar(255) null,
            "from" varchar(320) not null,
            "from_domain" varchar(255) null,
            "to" jsonb not null default '{}',
            "cc" jsonb not null default '{}',
            "bcc" jsonb not null default '{}',
            "reply_to" jsonb not null default '{}',
            "subject" text null,
            "html_body" text null,
            "text_body" text null,
            "status" sent_email_status not null default 'pending',
            "provider" varchar(100) null,
            "provider_response" text null,
            "failure_reason" text null,
            "sent_at" timestamptz null,
            "thread_id" varchar(21) null,
            "thread_position" integer null,
            "created_at" timestamptz not null default now()
        );

        alter table
            "sent_email"
        add
            constraint "sent_email_ses_message_id_unique" unique ("ses_message_id");

        create index "sent_email_thread_id_idx" on "sent_email" ("thread_id");

        create table "endpoint_delivery" (
            "id" varchar(21) primary key,
            "email_id" varchar(21) not null,
            "endpoint_id" varchar(21) not null,
            "delivery_type" delivery_type not null,
            "status" delivery_status not null default 'pending',
            "attempts" integer not null default 0,
            "last_attempt_at" timestamptz null,
            "response_data" jsonb null,
            "created_at" timestamptz not null default now(),
            "updated_at" timestamptz not null default now()
        );

        alter table
            "endpoint_delivery"
        add
            constraint "endpoint_delivery_email_id_endpoint_id_unique" unique ("email_id", "endpoint_id");

        create table "email_delivery_event" (
            "id" varchar(21) primary key,
            "event_type" varchar(50) not null,
            "bounce_type" bounce_type null,
            "bounce_sub_type" bounce_sub_type null,
            "status_code" varchar(16) null,
            "status_class" smallint null,
            "status_category" smallint null,
            "diagnostic_code" text null,
            "failed_recipient" varchar(320) null,
            "failed_recipient_domain" varchar(255) null,
            "original_message_id" varchar(998) null,
            "original_sent_email_id" varchar(21) null,
            "original_from" varchar(320) null,
            "original_to" varchar(320) null,
            "original_subject" text null,
            "original_sent_at" timestamptz null,
            "dsn_email_id" varchar(255) null,
            "dsn_received_at" timestamptz null,
            "reporting_mta" varchar(255) null,
            "remote_mta" varchar(255) null,
            "user_id" varchar(21) null,
            "domain_id" varchar(21) null,
            "domain_name" varchar(255) null,
            "tenant_id" varchar(21) null,
            "tenant_name" varchar(255) null,
            "action_taken" delivery_event_action_taken not null default 'none',
            "added_to_blocklist" boolean not null default false,
            "blocklist_id" varchar(21) null,
            "raw_dsn_content" text null,
            "created_at" timestamptz not null default now()
        );

        alter table
            "email_delivery_event"
        add
            constraint "email_delivery_event_dsn_email_id_unique" unique ("dsn_email_id");

        create index "email_delivery_event_original_sent_email_idx" on "email_delivery_event" ("original_sent_email_id");

        alter table
            "email_address"
        add
            constraint "email_address_domain_id_foreign" foreign key ("domain_id") references "email_domain" ("id") on update cascade on delete cascade;

        alter table
            "email_address"
        add
            constraint "email_address_endpoint_id_foreign" foreign key ("endpoint_id") references "endpoint" ("id") on update cascade on delete
        set
            null;

        alter table
            "email_address"
        add
            constraint "email_address_webhook_id_foreign" foreign key ("webhook_id") references "webhook" ("id") on update cascade on delete
        set
            null;

        alter table
            "email_domain"
        add
            constraint "email_domain_catch_all_endpoint_id_foreign" foreign key ("catch_all_endpoint_id") references "endpoint" ("id") on update cascade on delete
        set
            null;

        alter table
            "email_domain"
        add
            constraint "email_domain_catch_all_webhook_id_foreign" foreign key ("catch_all_webhook_id") references "webhook" ("id") on update cascade on delete
        set
            null;

        alter table
            "blocked_email"
        add
            constraint "blocked_email_domain_id_foreign" foreign key ("domain_id") references "email_domain" ("id") on update cascade on delete cascade;

        alter table
            "structured_email"
        add
            constraint "structured_email_thread_id_foreign" foreign key ("thread_id") references "email_thread" ("id") on update cascade on delete
        set
            null;

        alter table
            "structured_email"
        add
            constraint "structured_email_guard_rule_id_foreign" foreign key ("guard_rule_id") references "guard_rule" ("id") on update cascade on delete
        set
            null;

        alter table
            "sent_email"
        add
            constraint "sent_email_thread_id_foreign" foreign key ("thread_id") references "email_thread" ("id") on update cascade on delete
        set
            null;

        alter table
            "endpoint_delivery"
        add
            constraint "endpoint_delivery_email_id_foreign" foreign key ("email_id") references "structured_email" ("id") on update cascade on delete cascade;

        alter table
            "endpoint_delivery"
        add
            constraint "endpoint_delivery_endpoint_id_foreign" foreign key ("endpoint_id") references "endpoint" ("id") on update cascade on delete cascade;

        alter table
            "email_delivery_event"
        add
            constraint "email_delivery_event_original_sent_email_id_foreign" foreign key ("original_sent_email_id") references "sent_email" ("id") on update cascade on delete
        set
            null;

        alter table
            "email_delivery_event"
        add
            constraint "email_delivery_event_domain_id_foreign" foreign key ("domain_id") references "email_domain" ("id") on update cascade on delete
        set
            null;

        alter table
            "email_delivery_event"
        add
            constraint "email_delivery_event_blocklist_id_foreign" foreign key ("blocklist_id") references "blocked_email" ("id") on update cascade on delete
        set
            null;
        "#;

        db.execute_unprepared(statement).await?;

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Err(DbErr::Custom(String::from("cannot be reverted")))
    }
}
