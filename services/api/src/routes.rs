use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;

use crate::infra::AppState;
use honors_engine::honors::{
    honors_router, GradeStore, HonorResultStore, HonorsState, NotificationGateway, StudentRoster,
};

/// Mount the engine routes plus the service endpoints every deployment
/// carries: health, readiness, and Prometheus metrics.
pub(crate) fn with_honors_routes<R, G, S, N>(state: HonorsState<R, G, S, N>) -> axum::Router
where
    R: StudentRoster + 'static,
    G: GradeStore + 'static,
    S: HonorResultStore + 'static,
    N: NotificationGateway + 'static,
{
    honors_router(state)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
