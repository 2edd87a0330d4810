use std::{collections::HashMap, env};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use shared::{constants::rabbitmq::OP_INGEST_DSN, dto::routing::DsnIngestJob};

use super::server::AppState;

/// forbids any incoming requests where `X-Dsn-Shared-Secret` does not match
/// the configured secret, in order to avoid untrusted senders queuing
/// arbitrary DSN-ingestion jobs. A deployment with no secret configured
/// trusts its network perimeter instead.
#[tracing::instrument(skip_all)]
pub async fn check_dsn_shared_secret_middleware(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    nxt: Next,
) -> Result<Response, (StatusCode, String)> {
    if let Some(expected) = &state.dsn_shared_secret {
        let provided = req
            .headers()
            .get("x-dsn-shared-secret")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        if provided != expected {
            tracing::error!("invalid or missing DSN shared secret");
            return Err((StatusCode::FORBIDDEN, String::from("invalid shared secret")));
        }
    }

    Ok(nxt.run(req).await)
}

/// Accepts a raw RFC-822 DSN message body and enqueues it as an `ingestDsn`
/// job for the queue consumer to parse and record (C1/C6), so both the
/// RabbitMQ and HTTP ingestion paths share the exact same handler.
#[tracing::instrument(skip_all)]
pub async fn ingest_dsn(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<String, StatusCode> {
    let dsn_email_id = headers
        .get("x-amz-sns-message-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| nanoid::nanoid!());

    let job = DsnIngestJob {
        dsn_email_id,
        raw_base64: base64::engine::general_purpose::STANDARD.encode(&body),
        received_at: chrono::Utc::now(),
    };

    let payload = serde_json::to_vec(&job).map_err(|err| {
        tracing::error!(error = %err, "failed to serialize DsnIngestJob");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    state.router_rmq.enqueue_job(OP_INGEST_DSN, &payload).await.map_err(|err| {
        tracing::error!(error = %err, "failed to enqueue DSN ingestion job");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok("dsn queued for ingestion".to_owned())
}

pub async fn healthcheck(Query(params): Query<HashMap<String, String>>) -> (StatusCode, String) {
    if params.get("debug").map(|v| v == "true").unwrap_or(false) {
        let commit_sha = env::var("COMMIT_HASH").unwrap_or_else(|_| "unknown".to_string());

        return (StatusCode::OK, format!("OK, commit HASH: {}", commit_sha));
    }

    (StatusCode::OK, String::from("ok"))
}
