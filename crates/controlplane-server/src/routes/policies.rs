//! `POST /api/v1/policies/evaluate` — lets a caller dry-run the policy
//! engine against an ad-hoc context without the request actually having to
//! match a real routed operation. Deliberately outside
//! [`crate::middleware::policy::evaluate`]'s own `classify`, so this does
//! not double-evaluate itself.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use controlplane::error::ControlPlaneError;
use controlplane::policy::PolicyContext;
use serde::Deserialize;
use serde_json::Value;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub resource: String,
    pub operation: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

pub async fn evaluate(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let payload: EvaluateRequest = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => return ControlPlaneError::BadRequest(err.to_string()).into_response(),
    };

    let mut ctx = PolicyContext::new(payload.resource, payload.operation)
        .user_id(payload.user_id)
        .tenant_id(payload.tenant_id)
        .role(payload.role);
    for (key, value) in payload.attributes {
        ctx = ctx.attribute(key, value);
    }

    Json(state.policy_engine.evaluate(&ctx)).into_response()
}
