//! Route handlers, grouped by resource. [`crate::pipeline`] registers each
//! module's routes onto the assembled `Router`.

pub mod auth;
pub mod cluster;
pub mod health;
pub mod operations;
pub mod policies;
pub mod tenants;
pub mod users;

use axum::extract::Request;
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use controlplane::error::ControlPlaneError;
use controlplane::proxy::{ProxyRequest, ProxyResponse};

use crate::state::AppState;

/// Forwards one request to the core unchanged and relays its response
/// unchanged. Only a connection failure is translated, into the shared
/// error taxonomy's `core_unavailable`.
///
/// # Errors
/// Returns [`ControlPlaneError::CoreUnavailable`] if the core cannot be
/// reached, or [`ControlPlaneError::BadRequest`] if the outbound request
/// could not be built.
pub async fn relay(
    state: &AppState,
    method: Method,
    path_and_query: String,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ControlPlaneError> {
    let request = ProxyRequest {
        method,
        path_and_query,
        headers,
        body,
    };
    let response = state.core_proxy.forward(request).await?;
    Ok(into_axum_response(response))
}

fn into_axum_response(response: ProxyResponse) -> Response {
    let mut built = (response.status, response.body).into_response();
    *built.headers_mut() = response.headers;
    built
}

/// Forwards an inbound request to the core unchanged, buffering its body
/// first. Used for the handful of routes (login, register) that are relayed
/// without any local admission logic of their own.
///
/// # Errors
/// Returns [`ControlPlaneError::BadRequest`] if the body cannot be read, or
/// whatever [`relay`] returns for a downstream failure.
pub async fn forward_request(state: &AppState, req: Request) -> Result<Response, ControlPlaneError> {
    let method = req.method().clone();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_owned(), |pq| pq.as_str().to_owned());
    let headers = req.headers().clone();
    let body = axum::body::to_bytes(req.into_body(), 10 * 1024 * 1024)
        .await
        .map_err(|_| ControlPlaneError::BadRequest("could not read request body".to_owned()))?;
    relay(state, method, path_and_query, headers, body).await
}
