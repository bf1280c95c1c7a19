//! Assembles the full `Router`: every route, wrapped by the admission
//! pipeline's middleware stack.
//!
//! Layers are added innermost-first; each `.layer()` call wraps everything
//! added before it, so the LAST layer added is the FIRST to see the request
//! and the LAST to see the response. Desired execution order (outermost to
//! innermost) is: request id + timing (and, on the way out, audit + metrics)
//! → CORS → rate limit → token verification → permission guard → tenant
//! isolation → policy evaluation → the route handler itself. Layers are
//! therefore added in the reverse of that list.

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};

use crate::middleware::{audit_observability, auth, permission, policy, rate_limit, tenant_isolation};
use crate::routes;
use crate::state::AppState;

#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/me", get(routes::auth::me))
        .route("/cluster/status", get(routes::cluster::status))
        .route("/health/core", get(routes::cluster::health_core))
        .route("/metrics/json", get(routes::cluster::metrics_json))
        .route("/operations/{name}", post(routes::operations::dispatch))
        .route("/tenants", get(routes::tenants::list).post(routes::tenants::create))
        .route(
            "/tenants/{id}",
            get(routes::tenants::get).put(routes::tenants::update).delete(routes::tenants::delete),
        )
        .route("/users", get(routes::users::list))
        .route("/users/{id}", delete(routes::users::delete))
        .route("/policies/evaluate", post(routes::policies::evaluate));

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::health::metrics))
        .nest("/api/v1", api)
        .layer(from_fn_with_state(state.clone(), policy::evaluate))
        .layer(from_fn_with_state(state.clone(), tenant_isolation::check))
        .layer(from_fn_with_state(state.clone(), permission::guard))
        .layer(from_fn_with_state(state.clone(), auth::verify))
        .layer(from_fn_with_state(state.clone(), rate_limit::throttle))
        .layer(crate::cors::layer())
        .layer(from_fn_with_state(state.clone(), audit_observability::wrap))
        .with_state(state)
}
