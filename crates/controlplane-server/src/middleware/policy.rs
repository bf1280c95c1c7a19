//! §4.6 step 8: builds a [`PolicyContext`] from the route, the caller's
//! identity, and (for the handful of routes that need it) the request
//! body, then evaluates it. The policy engine itself never sees any of
//! this HTTP plumbing — this module is the seam the design notes call for.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use controlplane::error::ControlPlaneError;
use controlplane::identity::AuthContext;
use controlplane::policy::PolicyContext;
use serde_json::Value;

use crate::context::SharedFacts;
use crate::state::AppState;

pub async fn evaluate(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let facts = req.extensions().get::<SharedFacts>().cloned();
    let auth = facts.as_ref().and_then(SharedFacts::auth);

    let Some((resource, needs_body)) = classify(&method, &path) else {
        return next.run(req).await;
    };

    let req = if needs_body {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(_) => return ControlPlaneError::BadRequest("could not read request body".to_owned()).into_response(),
        };
        let body_json: Option<Value> = serde_json::from_slice(&bytes).ok();
        let ctx = build_context(resource, &method, &path, auth.as_ref(), body_json.as_ref());
        let verdict = state.policy_engine.evaluate(&ctx);
        if let Some(facts) = &facts {
            facts.set_verdict(verdict.clone());
        }
        if !verdict.allowed {
            return ControlPlaneError::PolicyDeny {
                policy_id: verdict.matched_policy_id.unwrap_or_default(),
                message: verdict.message,
            }
            .into_response();
        }
        Request::from_parts(parts, Body::from(bytes))
    } else {
        let ctx = build_context(resource, &method, &path, auth.as_ref(), None);
        let verdict = state.policy_engine.evaluate(&ctx);
        if let Some(facts) = &facts {
            facts.set_verdict(verdict.clone());
        }
        if !verdict.allowed {
            return ControlPlaneError::PolicyDeny {
                policy_id: verdict.matched_policy_id.unwrap_or_default(),
                message: verdict.message,
            }
            .into_response();
        }
        req
    };

    next.run(req).await
}

/// Returns the policy resource name for a route, and whether its body must
/// be inspected to build the full context (tenant creation, operations).
fn classify(method: &Method, path: &str) -> Option<(&'static str, bool)> {
    if path == "/api/v1/tenants" {
        return Some(("tenant", *method == Method::POST));
    }
    if path.starts_with("/api/v1/tenants/") {
        return Some(("tenant", false));
    }
    if path.starts_with("/api/v1/users") {
        return Some(("user", false));
    }
    if path.starts_with("/api/v1/operations/") {
        return Some(("operation", *method == Method::POST));
    }
    None
}

fn build_context(
    resource: &'static str,
    method: &Method,
    path: &str,
    auth: Option<&AuthContext>,
    body: Option<&Value>,
) -> PolicyContext {
    let operation = operation_for(resource, method, path);
    let mut ctx = PolicyContext::new(resource, operation);
    if let Some(auth) = auth {
        ctx = ctx.user_id(auth.user_id.clone()).role(auth.role.to_string());
    }

    match resource {
        "tenant" => {
            let target = path_segment_after(path, "tenants")
                .map(str::to_owned)
                .or_else(|| body.and_then(|b| b.get("id")).and_then(Value::as_str).map(str::to_owned));
            ctx = ctx.tenant_id(target.unwrap_or_default());
        }
        "user" => {
            if let Some(auth) = auth {
                ctx = ctx.tenant_id(auth.tenant_id.clone());
            }
            if let Some(target) = path_segment_after(path, "users") {
                ctx = ctx.attribute("target_user_id", target);
            }
        }
        "operation" => {
            if let Some(auth) = auth {
                ctx = ctx.tenant_id(auth.tenant_id.clone());
            }
            if let Some(name) = path_segment_after(path, "operations") {
                ctx = ctx.attribute("operation_type", name);
            }
            if let Some(record_count) = body.and_then(|b| b.get("record_count")).and_then(Value::as_u64) {
                ctx = ctx.attribute("record_count", record_count);
            }
            if let Some(recent) = body.and_then(|b| b.get("recent_operations")).and_then(Value::as_u64) {
                ctx = ctx.attribute("recent_operations", recent);
            }
        }
        _ => {}
    }

    ctx
}

fn operation_for(resource: &str, method: &Method, path: &str) -> String {
    if resource == "operation" {
        return path_segment_after(path, "operations").unwrap_or("unknown").to_owned();
    }
    match *method {
        Method::GET => "read",
        Method::POST => "create",
        Method::PUT => "update",
        Method::PATCH => "modify",
        Method::DELETE => "delete",
        _ => "unknown",
    }
    .to_owned()
}

fn path_segment_after<'a>(path: &'a str, marker: &str) -> Option<&'a str> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if segment == marker {
            return segments.next();
        }
    }
    None
}
