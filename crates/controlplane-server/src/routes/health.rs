//! `/health` and `/metrics` — exempt from authentication, permission checks,
//! and rate limiting per [`crate::middleware::EXEMPT_PATHS`], so a load
//! balancer or scraper never needs a token.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Minimal Prometheus exposition text. `GET /api/v1/metrics/json`
/// (see [`crate::routes::cluster::metrics_json`]) carries the structured
/// equivalent for callers that want JSON instead.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    state.metrics.set_uptime_seconds(uptime);
    let body = format!(
        "# TYPE controlplane_uptime_seconds gauge\n\
         controlplane_uptime_seconds {uptime}\n\
         # TYPE controlplane_http_requests_in_flight gauge\n\
         controlplane_http_requests_in_flight {in_flight}\n",
        in_flight = state.metrics.in_flight(),
    );
    ([("content-type", "text/plain; version=0.0.4")], body)
}
