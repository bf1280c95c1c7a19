//! §4.6 step 5: bearer token verification. Skipped entirely for `/health`,
//! `/metrics`, and the two unauthenticated auth routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use controlplane::error::ControlPlaneError;

use super::{AUTH_EXEMPT_PATHS, EXEMPT_PATHS, is_exempt};
use crate::context::SharedFacts;
use crate::state::AppState;

pub async fn verify(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if is_exempt(path, EXEMPT_PATHS) || is_exempt(path, AUTH_EXEMPT_PATHS) {
        return next.run(req).await;
    }

    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match state.token_verifier.verify(header).await {
        Ok(auth) => {
            if let Some(facts) = req.extensions().get::<SharedFacts>() {
                facts.set_auth(auth);
            }
            next.run(req).await
        }
        Err(err) => ControlPlaneError::from(err).into_response(),
    }
}
