//! `POST /api/v1/operations/{name}`. `snapshot` and `replay` are handled
//! locally and recorded against their own counters; `backup` proxies to the
//! core. Any other name (including an ad-hoc one like `bulk_delete`) is
//! accepted as a generic local operation — the permission guard and policy
//! engine have already run by the time a handler sees it, so a warned-but-
//! allowed operation still executes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::context::SharedFacts;
use crate::state::AppState;

pub async fn dispatch(State(state): State<Arc<AppState>>, Path(name): Path<String>, req: Request) -> Response {
    let actor = req
        .extensions()
        .get::<SharedFacts>()
        .and_then(SharedFacts::auth)
        .map(|auth| auth.user_id)
        .unwrap_or_default();

    match name.as_str() {
        "snapshot" => {
            state.metrics.record_snapshot_operation();
            log_operation(&state, "snapshot", &name, &actor);
            Json(json!({ "status": "accepted", "operation": "snapshot" })).into_response()
        }
        "replay" => {
            state.metrics.record_replay_operation();
            log_operation(&state, "replay", &name, &actor);
            Json(json!({ "status": "accepted", "operation": "replay" })).into_response()
        }
        "backup" => match super::forward_request(&state, req).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        },
        other => {
            log_operation(&state, other, &name, &actor);
            Json(json!({ "status": "accepted", "operation": other })).into_response()
        }
    }
}

fn log_operation(state: &AppState, operation: &str, resource_id: &str, actor: &str) {
    if let Err(err) = state.audit.log_operation_event(operation, resource_id, actor, "accepted") {
        tracing::error!(%err, operation, "failed to write operation audit event");
    }
}
