use std::{env, sync::OnceLock};

use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct AppConfig {
    /// If the application should be run in debug mode and print additional info to stdout
    pub app_debug: bool,

    /// The service name to be used on the tracing spans
    pub tracer_service_name: String,

    /// Postgres connection string
    pub database_url: String,

    /// Rabbitmq uri
    pub rmq_uri: String,

    /// Name of the rabbitmq queue this service will consume `routeEmail`/`ingestDsn` jobs from
    pub rmq_queue: String,

    /// Tag name for the rabbitmq consumer of the queue in rmq_queue
    pub rmq_consumer_tag: String,

    /// Name of the exchange to publish routing events (delivery outcomes, spike alerts) to
    pub rmq_routing_events_exchange: String,

    /// AWS region, used for the outbound SES forwarder
    pub aws_region: String,

    /// Maximum amount of sendEmail operations per second for the AWS account
    pub aws_ses_max_emails_per_second: u32,

    /// HTTP port used to receive health checks and DSN/bounce webhooks
    pub http_port: u16,

    /// Base URL this service is reachable at, used to compose attachment
    /// download URLs in webhook payloads (spec.md §6's `baseUrl`)
    pub base_url: String,

    /// Slack incoming-webhook URL spike alerts are posted to
    pub slack_admin_webhook_url: Option<String>,

    /// Feature-flag id gating the guard rule engine (spec.md §4.1 step 4);
    /// when unset the guard engine always runs
    pub inbound_guard_feature_flag_url: Option<String>,

    /// Shared secret the `/dsn-events` ingestion endpoint requires on
    /// `X-Dsn-Shared-Secret`; unset disables the check (trusted network).
    pub dsn_shared_secret: Option<String>,

    /// opentelemetry exporter endpoint
    pub otel_exporter_otlp_endpoint: String,
}

impl AppConfig {
    pub fn from_env() -> AppConfig {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let base_path = env::var("CARGO_MANIFEST_DIR").unwrap_or_default();

        let yaml_config_file = File::with_name(&format!("{base_path}/env/{run_mode}.yaml"))
            .format(config::FileFormat::Yaml)
            .required(false);

        Config::builder()
            .add_source(yaml_config_file)
            .add_source(Environment::default())
            .build()
            .unwrap_or_else(|error| panic!("[CFG] error loading config, {:#?}", error))
            .try_deserialize::<AppConfig>()
            .unwrap_or_else(|error| panic!("[CFG] error deserializing config, {:#?}", error))
    }
}

/// returns a global read only reference to the app configuration
pub fn app_config() -> &'static AppConfig {
    static INSTANCE: OnceLock<AppConfig> = OnceLock::new();
    INSTANCE.get_or_init(AppConfig::from_env)
}
