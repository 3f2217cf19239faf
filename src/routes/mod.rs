// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use crate::alerts::AlertEvaluator;
use crate::docker_repo::ContainerTarget;
use crate::fanout::MetricStore;
use crate::hub::Hub;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<dyn MetricStore>,
    pub(crate) hub: Hub,
    pub(crate) evaluator: Arc<AlertEvaluator>,
    pub(crate) container_target: Arc<watch::Sender<ContainerTarget>>,
    pub(crate) ws_connections: Arc<AtomicUsize>,
}

pub fn app(
    store: Arc<dyn MetricStore>,
    hub: Hub,
    evaluator: Arc<AlertEvaluator>,
    container_target: watch::Sender<ContainerTarget>,
    ws_connections: Arc<AtomicUsize>,
) -> Router {
    let state = AppState {
        store,
        hub,
        evaluator,
        container_target: Arc::new(container_target),
        ws_connections,
    };
    Router::new()
        .route("/", get(|| async { "monitord: telemetry sampler is running" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route(
            "/api/monitoring",
            get(http::list_metrics).post(http::add_metric),
        ) // GET, POST /api/monitoring
        .route("/api/monitoring/stream", post(http::stream_metric)) // POST /api/monitoring/stream
        .route(
            "/api/monitoring/container",
            delete(http::clear_container_target),
        ) // DELETE /api/monitoring/container
        .route(
            "/api/monitoring/container/{id}",
            post(http::set_container_target),
        ) // POST /api/monitoring/container/{id}
        .route("/api/monitoring/{category}", get(http::metrics_by_category)) // GET /api/monitoring/{category}
        .route("/ws/metrics", get(ws::ws_metrics)) // WS /ws/metrics
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
