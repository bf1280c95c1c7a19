//! `/api/v1/auth/*`. Login and register are proxied to the core unauthenticated
//! (per [`crate::middleware::AUTH_EXEMPT_PATHS`]); `me` reads back the identity
//! the token verifier already placed in the request's [`SharedFacts`].

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::context::SharedFacts;
use crate::state::AppState;

pub async fn login(State(state): State<Arc<AppState>>, req: Request) -> Response {
    match super::forward_request(&state, req).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

pub async fn register(State(state): State<Arc<AppState>>, req: Request) -> Response {
    match super::forward_request(&state, req).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

pub async fn me(req: Request) -> Response {
    let auth = req.extensions().get::<SharedFacts>().and_then(SharedFacts::auth);
    let Some(auth) = auth else {
        return controlplane::error::ControlPlaneError::MissingAuth.into_response();
    };
    Json(json!({
        "user_id": auth.user_id,
        "username": auth.username,
        "tenant_id": auth.tenant_id,
        "role": auth.role.as_str(),
        "is_api_key": auth.is_api_key,
    }))
    .into_response()
}
