use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{
    config::app_config,
    http::routes::{check_dsn_shared_secret_middleware, healthcheck, ingest_dsn},
    queue::RouterRabbitmq,
};

#[derive(Clone)]
pub struct AppState {
    pub router_rmq: Arc<RouterRabbitmq>,
    pub dsn_shared_secret: Option<String>,
}

pub async fn start(router_rmq: Arc<RouterRabbitmq>) {
    let cfg = app_config();

    let state = AppState {
        router_rmq,
        dsn_shared_secret: cfg.dsn_shared_secret.clone(),
    };

    let healthcheck_router = Router::new().route("/healthcheck", get(healthcheck));

    let protected_router = Router::new()
        .route("/dsn-events", post(ingest_dsn))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            check_dsn_shared_secret_middleware,
        ));

    let app = Router::new()
        .merge(healthcheck_router)
        .merge(protected_router)
        .with_state(state);

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 0)), cfg.http_port);
    println!("[WEB] listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|_| panic!("[WEB] failed to get address {}", addr));

    axum::serve(listener, app.into_make_service())
        .await
        .unwrap_or_else(|_| panic!("[WEB] failed to serve app on address {}", addr))
}
