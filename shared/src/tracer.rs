use lapin::{
    message::Delivery,
    types::{AMQPValue, ShortString},
};
use opentelemetry::{
    propagation::{Extractor, Injector},
    sdk::trace::BatchConfig,
    Context,
};
use std::collections::BTreeMap;
use tokio::time;
use tracing::{error, info_span, warn, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// struct to Injecting and Extracting OTEL span contexts into/from a
/// rabbitmq delivery using its headers
pub struct AmqpHeaderCarrier<'a> {
    headers: &'a BTreeMap<ShortString, AMQPValue>,
}

impl<'a> AmqpHeaderCarrier<'a> {
    pub fn new(headers: &'a BTreeMap<ShortString, AMQPValue>) -> Self {
        Self { headers }
    }
}

impl<'a> Extractor for AmqpHeaderCarrier<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|header_value| {
            if let AMQPValue::LongString(header_value) = header_value {
                std::str::from_utf8(header_value.as_bytes())
                    .map_err(|e| error!("Error decoding header value {:?}", e))
                    .ok()
            } else {
                warn!("Missing amqp tracing context propagation");
                None
            }
        })
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(|header| header.as_str()).collect()
    }
}

struct AmqpHeaderInjector<'a> {
    headers: &'a mut BTreeMap<ShortString, AMQPValue>,
}

impl<'a> Injector for AmqpHeaderInjector<'a> {
    fn set(&mut self, key: &str, value: String) {
        self.headers
            .insert(key.into(), AMQPValue::LongString(value.into()));
    }
}

/// create a BTreeMap containing the injected context of a span, to be set as
/// the headers of a rabbitmq publish so the receiving service can correlate traces
pub fn create_amqp_headers_with_span_ctx(ctx: &Context) -> BTreeMap<ShortString, AMQPValue> {
    let mut amqp_headers = BTreeMap::new();

    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(ctx, &mut AmqpHeaderInjector {
            headers: &mut amqp_headers,
        })
    });

    amqp_headers
}

/// Extracts the text map propagator from the AMQP headers and creates a span
/// with the extracted context as the parent context.
pub fn correlate_trace_from_delivery(delivery: Delivery) -> (Span, Delivery) {
    let span = info_span!("correlate_trace_from_delivery");

    let headers = delivery
        .properties
        .headers()
        .clone()
        .unwrap_or_default()
        .inner()
        .clone();

    let parent_cx = opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.extract(&AmqpHeaderCarrier::new(&headers))
    });

    span.set_parent(parent_cx);

    (span, delivery)
}

/// # PANICS
///
/// when failing to initialize tracing or set globals
///
/// # TRACING INIT
///
/// This should be a part of your application bootstrap code, before any code
/// that uses the tracing crate is called.
///
/// Starts the tracing module with a open telemetry layer exporting spans to
/// a jaeger agent, keep in mind that traces are filtered with
/// `tracing_subscriber::EnvFilter`.
///
/// this sets the following globals:
///
/// - opentelemetry::global::set_text_map_propagator
/// - the global tracing subscriber
pub fn init(service_name: &str) {
    opentelemetry::global::set_text_map_propagator(opentelemetry_jaeger::Propagator::new());

    let tracer = opentelemetry_jaeger::new_agent_pipeline()
        .with_service_name(service_name)
        .with_auto_split_batch(true)
        .with_batch_processor_config(BatchConfig::default().with_max_export_batch_size(256))
        .install_batch(opentelemetry::runtime::Tokio)
        .expect("failed to initialize tracer");

    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

    Registry::default()
        .with(telemetry)
        .with(tracing_subscriber::fmt::Layer::default())
        .with(EnvFilter::from_default_env())
        .init();

    println!("[TRACER] initialized as service: {}", service_name);
}

/// async wrapper for `opentelemetry::global::shutdown_tracer_provider()` because
/// it might hang forever, see: https://github.com/open-telemetry/opentelemetry-rust/issues/868
async fn shutdown_trace_provider() {
    println!("[TRACER] shutting down");
    opentelemetry::global::shutdown_tracer_provider();
}

/// Shutdowns tracing with a timeout, to export all non exported spans.
pub async fn shutdown() {
    tokio::select! {
        _ = time::sleep(time::Duration::from_secs(5)) => {
            eprintln!("[TRACER] gracefull shutdown failed");
        },
        _ = tokio::task::spawn_blocking(shutdown_trace_provider) => {
            println!("[TRACER] gracefull shutdown ok");
        }
    }
}
