//! §4.6 step 7: the caller's tenant must match the tenant named in the
//! path, unless the caller holds `ManageTenants`. Kept as defense-in-depth
//! alongside the permission guard, which requires `ManageTenants` for the
//! tenant list/get/update/delete routes today — if a future route exposes a
//! tenant-scoped path without that requirement, this still catches it.
//!
//! Also enforces the universal invariant that a tenant whose status is not
//! `active` cannot mutate anything through its own credentials: any
//! authenticated, non-`GET`/`HEAD` request is rejected with 403 unless the
//! caller's own tenant record is active.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use controlplane::error::ControlPlaneError;
use controlplane::identity::Permission;

use crate::context::SharedFacts;
use crate::state::AppState;

pub async fn check(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let auth = req.extensions().get::<SharedFacts>().and_then(SharedFacts::auth);

    if let Some(target_tenant) = tenant_path_id(req.uri().path()) {
        if let Some(auth) = &auth {
            if !auth.has_permission(Permission::ManageTenants) && auth.tenant_id != target_tenant {
                return ControlPlaneError::TenantMismatch.into_response();
            }
        }
    }

    if is_mutating(req.method()) {
        if let Some(auth) = &auth {
            if let Ok(tenant) = state.tenants.get(&auth.tenant_id).await {
                if !tenant.is_active() {
                    return ControlPlaneError::TenantInactive.into_response();
                }
            }
        }
    }

    next.run(req).await
}

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn tenant_path_id(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/api/v1/tenants/")?;
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_tenant_detail_path() {
        assert_eq!(tenant_path_id("/api/v1/tenants/acme"), Some("acme"));
    }

    #[test]
    fn list_path_has_no_target_tenant() {
        assert_eq!(tenant_path_id("/api/v1/tenants"), None);
    }

    #[test]
    fn nested_path_is_not_a_tenant_id() {
        assert_eq!(tenant_path_id("/api/v1/tenants/acme/users"), None);
    }

    #[test]
    fn get_and_head_are_not_mutating() {
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
        assert!(!is_mutating(&Method::OPTIONS));
    }

    #[test]
    fn post_put_delete_are_mutating() {
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::PUT));
        assert!(is_mutating(&Method::DELETE));
    }
}
