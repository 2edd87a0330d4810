use std::sync::Arc;

use inbound_core::persistence::SeaOrmPersistence;
use inbound_core::spike::SpikeDetector;
use inbound_core::webhook::ReqwestWebhookClient;
use lapin::message::Delivery;
use queue::{controller::router::QueueRouter, RouterRabbitmq};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use tokio::sync::mpsc;
use tracing::Instrument;

mod config;
mod db;
mod features;
mod http;
mod notify;
mod outbound;
mod queue;
mod utils;

use config::app_config;
use features::HttpFeatureFlagProvider;
use notify::{SlackSpikeNotifier, SpikeNotifierFanout};
use outbound::ses::SesOutboundSender;

const SPIKE_SWEEP_INTERVAL_SECS: u64 = 15 * 60;

#[tokio::main]
async fn main() {
    let cfg = app_config();
    shared::tracer::init(&cfg.tracer_service_name);

    let db = db::create_db_conn(&cfg.database_url).await;
    db::run_migrations(&db).await;

    let persistence: Arc<dyn inbound_core::persistence::Persistence> = Arc::new(SeaOrmPersistence::new(db));
    let webhook_client: Arc<dyn inbound_core::webhook::WebhookClient> = Arc::new(ReqwestWebhookClient::new());
    let outbound_sender: Arc<dyn inbound_core::forwarder::OutboundSender> =
        Arc::new(SesOutboundSender::new(&cfg.aws_region, cfg.aws_ses_max_emails_per_second).await);
    let feature_provider: Arc<dyn inbound_core::pipeline::FeatureFlagProvider> =
        Arc::new(HttpFeatureFlagProvider::new(cfg.inbound_guard_feature_flag_url.clone()));

    let (sender, mut receiver) = mpsc::unbounded_channel::<Delivery>();

    let router_rmq = Arc::new(RouterRabbitmq::new(sender));

    let router = Arc::new(QueueRouter::new(
        router_rmq.clone(),
        persistence.clone(),
        webhook_client,
        outbound_sender,
        feature_provider,
        cfg.base_url.clone(),
    ));

    let consumer_rmq = router_rmq.clone();
    let http_rmq = router_rmq.clone();
    let shutdown_rmq = router_rmq.clone();

    tokio::spawn(async move { consumer_rmq.start_consumer().await });
    tokio::spawn(async move { http::server::start(http_rmq).await });
    tokio::spawn(spike_sweep_task(persistence, router_rmq));

    listen_to_shutdown_signals(shutdown_rmq);

    while let Some(delivery) = receiver.recv().await {
        let (span, delivery) = shared::tracer::correlate_trace_from_delivery(delivery);
        let router = router.clone();
        tokio::spawn(async move { router.handle_delivery(delivery).instrument(span).await });
    }
}

/// Periodically sweeps every user with recent sending activity through the
/// spike detector (C8), the cron-style counterpart to the per-delivery
/// routing work driven off the queue.
async fn spike_sweep_task(
    persistence: Arc<dyn inbound_core::persistence::Persistence>,
    router_rmq: Arc<RouterRabbitmq>,
) {
    let detector = SpikeDetector::new();
    let slack = SlackSpikeNotifier::new(app_config().slack_admin_webhook_url.clone());
    let notifier = SpikeNotifierFanout::new(slack, router_rmq);

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(SPIKE_SWEEP_INTERVAL_SECS));

    loop {
        interval.tick().await;

        let since = chrono::Utc::now() - chrono::Duration::hours(24);

        let user_ids = match persistence.list_sender_user_ids_since(since).await {
            Ok(ids) => ids,
            Err(err) => {
                tracing::error!(error = %err, "failed to list sender user ids for spike sweep");
                continue;
            }
        };

        for user_id in user_ids {
            if let Err(err) = detector.check(persistence.as_ref(), &notifier, &user_id, None, None).await {
                tracing::error!(%user_id, error = %err, "spike check failed");
            }
        }
    }
}

/// Listen to shutdown signals `SIGINT` and `SIGTERM`, on a signal gracefully shutdowns down the application
#[allow(clippy::never_loop)]
fn listen_to_shutdown_signals(rmq: Arc<RouterRabbitmq>) {
    let mut signals = Signals::new([SIGINT, SIGTERM]).expect("failed to setup signals hook");

    tokio::spawn(async move {
        for sig in signals.forever() {
            println!("\n[APP] received signal: {}, shutting down", sig);

            shared::tracer::shutdown().await;
            rmq.shutdown().await;

            std::process::exit(sig)
        }
    });
}
