//! `/api/v1/cluster/*`, `/api/v1/health/core`, and the JSON metrics mirror.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use controlplane::proxy::ProxyRequest;
use serde_json::json;

use crate::state::AppState;

pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    Json(json!({
        "status": "ok",
        "uptime_seconds": uptime,
        "in_flight_requests": state.metrics.in_flight(),
    }))
}

pub async fn metrics_json(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    state.metrics.set_uptime_seconds(uptime);
    Json(state.metrics.snapshot_json())
}

/// Proxies a plain `GET /health` to the core and records the outcome against
/// `core_health_check_total`, translating a downstream failure into the
/// shared error taxonomy rather than hiding it behind a local "ok".
pub async fn health_core(State(state): State<Arc<AppState>>) -> Response {
    let request = ProxyRequest {
        method: http::Method::GET,
        path_and_query: "/health".to_owned(),
        headers: http::HeaderMap::new(),
        body: Bytes::new(),
    };
    match state.core_proxy.forward(request).await {
        Ok(response) => {
            let status = if response.status.is_success() { "ok" } else { "degraded" };
            state.metrics.record_core_health_check(status);
            let mut built = (response.status, response.body).into_response();
            *built.headers_mut() = response.headers;
            built
        }
        Err(err) => {
            state.metrics.record_core_health_check("unreachable");
            controlplane::error::ControlPlaneError::from(err).into_response()
        }
    }
}
