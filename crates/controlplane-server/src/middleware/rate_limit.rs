//! §4.6 step 4: per-connection token-bucket throttling. Runs *before* the
//! token verifier, so the bucket key is the caller's address rather than an
//! authenticated identity — this is what protects the verifier itself from
//! an unauthenticated flood. Skipped for `/health` and `/metrics`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use controlplane::error::ControlPlaneError;
use controlplane::rate_limit::Tier;

use super::{EXEMPT_PATHS, is_exempt};
use crate::state::AppState;

pub async fn throttle(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    if is_exempt(req.uri().path(), EXEMPT_PATHS) {
        return next.run(req).await;
    }

    let identity = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned());

    match state.rate_limiter.check(&identity, Tier::Standard) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => ControlPlaneError::RateLimitExceeded { retry_after }.into_response(),
    }
}
