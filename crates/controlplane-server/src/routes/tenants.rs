//! `/api/v1/tenants*`. List, get, create, and update operate on the local
//! in-memory repository; delete proxies to the core (core response relayed
//! unchanged) and then best-effort mirrors the delete locally, since the
//! core is authoritative for tenant removal.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Response};
use controlplane::error::ControlPlaneError;
use controlplane::model::{Tenant, normalize_tenant_id};
use controlplane::rate_limit::Tier;
use controlplane::repository::RepositoryError;
use serde::Deserialize;

use crate::context::SharedFacts;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub id: String,
    pub name: String,
    #[serde(default = "default_tier")]
    pub tier: Tier,
}

fn default_tier() -> Tier {
    Tier::Standard
}

#[derive(Debug, Deserialize)]
pub struct UpdateTenantRequest {
    pub name: Option<String>,
    pub tier: Option<Tier>,
}

pub async fn list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.tenants.list().await)
}

pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.tenants.get(&id).await {
        Ok(tenant) => Json(tenant).into_response(),
        Err(err) => ControlPlaneError::from(err).into_response(),
    }
}

pub async fn create(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let actor = actor_id(&req);
    let (_, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, 1024 * 1024).await {
        Ok(bytes) => bytes,
        Err(_) => return ControlPlaneError::BadRequest("could not read request body".to_owned()).into_response(),
    };
    let payload: CreateTenantRequest = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(err) => return ControlPlaneError::BadRequest(err.to_string()).into_response(),
    };

    let Some(id) = normalize_tenant_id(&payload.id) else {
        return ControlPlaneError::BadRequest(format!("invalid tenant id '{}'", payload.id)).into_response();
    };
    let tenant = Tenant::new(id, payload.name, payload.tier);
    match state.tenants.create(tenant).await {
        Ok(tenant) => {
            log_tenant(&state, "create", &tenant.id, &actor);
            Json(tenant).into_response()
        }
        Err(err) => ControlPlaneError::from(err).into_response(),
    }
}

pub async fn update(State(state): State<Arc<AppState>>, Path(id): Path<String>, req: Request) -> Response {
    let actor = actor_id(&req);
    let (_, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, 1024 * 1024).await {
        Ok(bytes) => bytes,
        Err(_) => return ControlPlaneError::BadRequest("could not read request body".to_owned()).into_response(),
    };
    let payload: UpdateTenantRequest = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(err) => return ControlPlaneError::BadRequest(err.to_string()).into_response(),
    };

    let mut tenant = match state.tenants.get(&id).await {
        Ok(tenant) => tenant,
        Err(err) => return ControlPlaneError::from(err).into_response(),
    };
    if let Some(name) = payload.name {
        tenant.name = name;
    }
    if let Some(tier) = payload.tier {
        tenant.tier = tier;
    }
    tenant.updated_at = chrono::Utc::now();

    match state.tenants.update(tenant).await {
        Ok(tenant) => {
            log_tenant(&state, "update", &tenant.id, &actor);
            Json(tenant).into_response()
        }
        Err(err) => ControlPlaneError::from(err).into_response(),
    }
}

pub async fn delete(State(state): State<Arc<AppState>>, Path(id): Path<String>, req: Request) -> Response {
    let actor = actor_id(&req);
    let response = match super::forward_request(&state, req).await {
        Ok(response) => response,
        Err(err) => return err.into_response(),
    };

    if response.status().is_success() {
        match state.tenants.delete(&id).await {
            Ok(()) | Err(RepositoryError::NotFound(_)) => {}
            Err(err) => tracing::warn!(tenant_id = %id, error = %err, "local tenant mirror-delete failed"),
        }
        log_tenant(&state, "delete", &id, &actor);
    }

    response
}

fn actor_id(req: &Request) -> String {
    req.extensions()
        .get::<SharedFacts>()
        .and_then(SharedFacts::auth)
        .map(|auth| auth.user_id)
        .unwrap_or_default()
}

fn log_tenant(state: &AppState, action: &str, tenant_id: &str, actor: &str) {
    if let Err(err) = state.audit.log_tenant_event(action, tenant_id, actor, "") {
        tracing::error!(%err, action, tenant_id, "failed to write tenant audit event");
    }
}
