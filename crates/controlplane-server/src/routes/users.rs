//! `/api/v1/users*`. Entirely local — user accounts are not proxied to the
//! core anywhere in this surface.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Response};
use controlplane::audit::AuditEvent;
use controlplane::error::ControlPlaneError;

use crate::context::SharedFacts;
use crate::state::AppState;

pub async fn list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.users.list().await)
}

pub async fn delete(State(state): State<Arc<AppState>>, Path(id): Path<String>, req: Request) -> Response {
    let actor = req
        .extensions()
        .get::<SharedFacts>()
        .and_then(SharedFacts::auth)
        .map(|auth| auth.user_id)
        .unwrap_or_default();

    match state.users.delete(&id).await {
        Ok(()) => {
            let mut event = AuditEvent::new("user_management", "delete", "user");
            event.resource_id = Some(id);
            event.user_id = Some(actor);
            if let Err(err) = state.audit.log(&event) {
                tracing::error!(%err, "failed to write user audit event");
            }
            axum::http::StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => ControlPlaneError::from(err).into_response(),
    }
}
