//! §4.6 step 6: the per-route permission guard. Routes that require no
//! specific permission (only that *some* authenticated identity exists, or
//! nothing at all) simply have no entry in the map.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use controlplane::error::ControlPlaneError;
use controlplane::identity::Permission;

use crate::context::SharedFacts;
use crate::state::AppState;

/// Per-method `matchit` routers mapping a path pattern to the permission it requires.
#[derive(Clone)]
pub struct PermissionMap {
    by_method: Arc<HashMap<Method, matchit::Router<Permission>>>,
}

impl PermissionMap {
    #[must_use]
    pub fn build() -> Self {
        let mut by_method: HashMap<Method, matchit::Router<Permission>> = HashMap::new();

        let mut insert = |method: Method, pattern: &str, permission: Permission| {
            by_method
                .entry(method)
                .or_insert_with(matchit::Router::new)
                .insert(pattern, permission)
                .expect("static permission route patterns never collide");
        };

        insert(Method::GET, "/api/v1/cluster/status", Permission::Read);
        insert(Method::GET, "/api/v1/metrics/json", Permission::Metrics);
        insert(Method::GET, "/api/v1/health/core", Permission::Read);

        insert(Method::POST, "/api/v1/operations/{name}", Permission::Admin);

        // POST /api/v1/tenants has no entry here: its authorization is the
        // `require-admin-tenant-create` policy, not this guard, so that a
        // non-admin caller is denied by the policy engine and the denial
        // produces a `policy_denial` audit record (see policy::evaluate).
        insert(Method::GET, "/api/v1/tenants", Permission::ManageTenants);
        insert(Method::GET, "/api/v1/tenants/{id}", Permission::ManageTenants);
        insert(Method::PUT, "/api/v1/tenants/{id}", Permission::ManageTenants);
        insert(Method::DELETE, "/api/v1/tenants/{id}", Permission::ManageTenants);

        insert(Method::GET, "/api/v1/users", Permission::Admin);
        insert(Method::DELETE, "/api/v1/users/{id}", Permission::Admin);

        insert(Method::POST, "/api/v1/policies/evaluate", Permission::Read);

        Self {
            by_method: Arc::new(by_method),
        }
    }

    #[must_use]
    pub fn required_permission(&self, method: &Method, path: &str) -> Option<Permission> {
        self.by_method
            .get(method)
            .and_then(|router| router.at(path).ok())
            .map(|matched| *matched.value)
    }
}

pub async fn guard(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let Some(required) = state
        .permissions
        .required_permission(req.method(), req.uri().path())
    else {
        return next.run(req).await;
    };

    let auth = req.extensions().get::<SharedFacts>().and_then(SharedFacts::auth);

    let Some(auth) = auth else {
        return ControlPlaneError::MissingAuth.into_response();
    };

    if !auth.has_permission(required) {
        return ControlPlaneError::PermissionDenied.into_response();
    }

    next.run(req).await
}
