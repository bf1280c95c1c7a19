//! The outermost layer of the pipeline: request id assignment and timing
//! start (§4.6 steps 1-2), and — on the way back out, regardless of which
//! inner layer terminated the request — the audit write and observability
//! exit (steps 10-11). Wrapping everything else is what guarantees the
//! audit record and the latency sample are produced for every request.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use controlplane::audit::{AuditEvent, derive_action, derive_resource};
use controlplane::policy::PolicyAction;
use uuid::Uuid;

use crate::context::{RequestTiming, SharedFacts};
use crate::state::AppState;

pub async fn wrap(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let started_at = Instant::now();
    let facts = SharedFacts::new();

    req.extensions_mut().insert(RequestTiming {
        request_id: request_id.clone(),
        started_at,
    });
    req.extensions_mut().insert(facts.clone());

    state.metrics.in_flight_enter();

    let method = req.method().as_str().to_owned();
    let path = req.uri().path().to_owned();

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    let status = response.status().as_u16();
    let duration = started_at.elapsed();

    state.metrics.in_flight_exit();
    state
        .metrics
        .record_request(&method, &path, status, duration.as_secs_f64());

    let auth = facts.auth();
    let verdict = facts.verdict();

    if let Some(verdict) = &verdict {
        if verdict.action != PolicyAction::Allow {
            let event_type = match verdict.action {
                PolicyAction::Deny => "policy_denial",
                PolicyAction::Warn => "policy_warning",
                PolicyAction::Allow => unreachable!("filtered above"),
            };
            let mut event = AuditEvent::new(event_type, derive_action(&method, &path), derive_resource(&path));
            if let Some(policy_id) = &verdict.matched_policy_id {
                event
                    .metadata
                    .insert("policy_id".to_owned(), serde_json::Value::String(policy_id.clone()));
            }
            event
                .metadata
                .insert("message".to_owned(), serde_json::Value::String(verdict.message.clone()));
            if let Some(auth) = &auth {
                event.user_id = Some(auth.user_id.clone());
                event.tenant_id = Some(auth.tenant_id.clone());
            }
            if let Err(err) = state.audit.log(&event) {
                tracing::error!(%err, "failed to write policy audit event");
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let duration_ms = duration.as_millis() as u64;

    let mut event = AuditEvent::new("api_request", derive_action(&method, &path), derive_resource(&path));
    event.method = Some(method);
    event.path = Some(path);
    event.status_code = Some(status);
    event.duration_ms = Some(duration_ms);
    event
        .metadata
        .insert("request_id".to_owned(), serde_json::Value::String(request_id.clone()));
    if let Some(auth) = &auth {
        event.user_id = Some(auth.user_id.clone());
        event.username = Some(auth.username.clone());
        event.tenant_id = Some(auth.tenant_id.clone());
    }
    if status >= 500 {
        event.error = Some("internal_error".to_owned());
    }
    if let Err(err) = state.audit.log(&event) {
        tracing::error!(%err, "failed to write api_request audit event");
    }

    response
}
