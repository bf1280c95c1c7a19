//! End-to-end exercises of the assembled router: a request enters exactly as
//! an HTTP client would send it, and every admission step (rate limit, token
//! verification, permission guard, tenant isolation, policy evaluation, the
//! handler itself) runs for real. Only the downstream core is a double.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use controlplane::audit::AuditSink;
use controlplane::auth::TokenVerifier;
use controlplane::config::AppConfig;
use controlplane::identity::Role;
use controlplane::model::{Tenant, TenantStatus};
use controlplane::observability::Metrics;
use controlplane::policy::PolicyEngine;
use controlplane::proxy::CoreProxy;
use controlplane::rate_limit::{RateLimiter, Tier};
use controlplane::repository::{FetchTenant, InMemoryTenantRepository, InMemoryUserRepository};
use controlplane_server::middleware::permission::PermissionMap;
use controlplane_server::pipeline::build_router;
use controlplane_server::state::AppState;
use httpmock::MockServer;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret";

#[derive(Serialize)]
struct Claims {
    sub: String,
    username: String,
    tenant_id: String,
    role: String,
    is_api_key: bool,
    exp: i64,
}

fn token(user_id: &str, tenant_id: &str, role: Role) -> String {
    let claims = Claims {
        sub: user_id.to_owned(),
        username: format!("{user_id}-name"),
        tenant_id: tenant_id.to_owned(),
        role: role.as_str().to_owned(),
        is_api_key: false,
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn expired_token(user_id: &str, tenant_id: &str, role: Role) -> String {
    let claims = Claims {
        sub: user_id.to_owned(),
        username: format!("{user_id}-name"),
        tenant_id: tenant_id.to_owned(),
        role: role.as_str().to_owned(),
        is_api_key: false,
        exp: chrono::Utc::now().timestamp() - 60,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn state_with_core(core_base_url: &str) -> Arc<AppState> {
    Arc::new(AppState {
        config: Arc::new(AppConfig::default()),
        token_verifier: Arc::new(TokenVerifier::new(SecretString::from(SECRET))),
        rate_limiter: RateLimiter::new(),
        policy_engine: Arc::new(PolicyEngine::seeded_with_defaults()),
        audit: Arc::new(AuditSink::disabled()),
        core_proxy: Arc::new(CoreProxy::new(core_base_url, std::time::Duration::from_secs(2))),
        tenants: Arc::new(InMemoryTenantRepository::new()),
        users: Arc::new(InMemoryUserRepository::new()),
        metrics: Arc::new(Metrics::new()),
        permissions: PermissionMap::build(),
        started_at: Instant::now(),
    })
}

fn state_with_audit(core_base_url: &str, audit: AuditSink) -> Arc<AppState> {
    Arc::new(AppState {
        config: Arc::new(AppConfig::default()),
        token_verifier: Arc::new(TokenVerifier::new(SecretString::from(SECRET))),
        rate_limiter: RateLimiter::new(),
        policy_engine: Arc::new(PolicyEngine::seeded_with_defaults()),
        audit: Arc::new(audit),
        core_proxy: Arc::new(CoreProxy::new(core_base_url, std::time::Duration::from_secs(2))),
        tenants: Arc::new(InMemoryTenantRepository::new()),
        users: Arc::new(InMemoryUserRepository::new()),
        metrics: Arc::new(Metrics::new()),
        permissions: PermissionMap::build(),
        started_at: Instant::now(),
    })
}

fn read_audit_events(path: &std::path::Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn with_peer(mut req: Request<Body>) -> Request<Body> {
    let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

fn authorized(method: &str, uri: &str, bearer: &str, body: Body) -> Request<Body> {
    with_peer(
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {bearer}"))
            .header("content-type", "application/json")
            .body(body)
            .unwrap(),
    )
}

#[tokio::test]
async fn deleting_the_default_tenant_is_denied_by_policy() {
    let server = MockServer::start();
    let router = build_router(state_with_core(&server.base_url()));
    let admin = token("u-admin", "acme", Role::Admin);

    let response = router
        .oneshot(authorized("DELETE", "/api/v1/tenants/default", &admin, Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_a_non_default_tenant_is_proxied_to_the_core() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::DELETE).path("/api/v1/tenants/acme");
        then.status(200).body("{\"deleted\":true}");
    });
    let router = build_router(state_with_core(&server.base_url()));
    let admin = token("u-admin", "acme", Role::Admin);

    let response = router
        .oneshot(authorized("DELETE", "/api/v1/tenants/acme", &admin, Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    mock.assert();
}

#[tokio::test]
async fn developer_cannot_create_a_tenant() {
    let server = MockServer::start();
    let router = build_router(state_with_core(&server.base_url()));
    let developer = token("u-dev", "acme", Role::Developer);
    let body = Body::from(r#"{"id":"new-tenant","name":"New Tenant"}"#);

    let response = router
        .oneshot(authorized("POST", "/api/v1/tenants", &developer, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// The denial for a non-admin tenant create must come from the policy
/// engine, not the permission guard: exactly one `policy_denial` audit
/// record is expected, naming `require-admin-tenant-create`.
#[tokio::test]
async fn developer_tenant_create_denial_is_recorded_as_a_policy_denial() {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.ndjson");
    let server = MockServer::start();
    let router = build_router(state_with_audit(&server.base_url(), AuditSink::open(&audit_path).unwrap()));
    let developer = token("u-dev", "acme", Role::Developer);
    let body = Body::from(r#"{"id":"new-tenant","name":"New Tenant"}"#);

    let response = router
        .oneshot(authorized("POST", "/api/v1/tenants", &developer, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(json["policy_id"], "require-admin-tenant-create");

    let events = read_audit_events(&audit_path);
    let denials: Vec<&Value> = events.iter().filter(|e| e["event_type"] == "policy_denial").collect();
    assert_eq!(denials.len(), 1);
    assert_eq!(denials[0]["metadata"]["policy_id"], "require-admin-tenant-create");
}

#[tokio::test]
async fn creating_a_tenant_with_an_invalid_id_is_a_bad_request() {
    let server = MockServer::start();
    let router = build_router(state_with_core(&server.base_url()));
    let admin = token("u-admin", "acme", Role::Admin);
    let body = Body::from(r#"{"id":"Bad_Id!","name":"Bad"}"#);

    let response = router
        .oneshot(authorized("POST", "/api/v1/tenants", &admin, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn a_suspended_tenant_cannot_create_a_new_tenant() {
    let server = MockServer::start();
    let state = state_with_core(&server.base_url());
    let mut suspended = Tenant::new("acme", "Acme Corp", Tier::Standard);
    suspended.status = TenantStatus::Suspended;
    state.tenants.create(suspended).await.unwrap();
    let router = build_router(state);
    let admin = token("u-admin", "acme", Role::Admin);
    let body = Body::from(r#"{"id":"other","name":"Other"}"#);

    let response = router
        .oneshot(authorized("POST", "/api/v1/tenants", &admin, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn a_suspended_tenant_cannot_delete_a_user() {
    let server = MockServer::start();
    let state = state_with_core(&server.base_url());
    let mut suspended = Tenant::new("acme", "Acme Corp", Tier::Standard);
    suspended.status = TenantStatus::Suspended;
    state.tenants.create(suspended).await.unwrap();
    let router = build_router(state);
    let admin = token("u-admin", "acme", Role::Admin);

    let response = router
        .oneshot(authorized("DELETE", "/api/v1/users/u-other", &admin, Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn a_user_cannot_delete_their_own_account() {
    let server = MockServer::start();
    let router = build_router(state_with_core(&server.base_url()));
    let admin = token("u-self", "acme", Role::Admin);

    let response = router
        .oneshot(authorized("DELETE", "/api/v1/users/u-self", &admin, Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn a_large_bulk_delete_is_warned_but_still_allowed() {
    let server = MockServer::start();
    let router = build_router(state_with_core(&server.base_url()));
    let admin = token("u-admin", "acme", Role::Admin);
    let body = Body::from(r#"{"record_count":50000}"#);

    let response = router
        .oneshot(authorized("POST", "/api/v1/operations/bulk_delete", &admin, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn an_expired_token_is_rejected() {
    let server = MockServer::start();
    let router = build_router(state_with_core(&server.base_url()));
    let expired = expired_token("u-admin", "acme", Role::Admin);

    let response = router
        .oneshot(authorized("GET", "/api/v1/tenants", &expired, Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn exceeding_the_rate_limit_returns_429_with_retry_after() {
    let server = MockServer::start();
    let state = state_with_core(&server.base_url());
    let router = build_router(state);
    let admin = token("u-admin", "acme", Role::Admin);

    // The standard tier's bucket capacity is 60 (600 requests/minute / 10);
    // the 61st request from the same peer address must be throttled.
    let mut last_status = StatusCode::OK;
    for _ in 0..61 {
        let response = router
            .clone()
            .oneshot(authorized("GET", "/api/v1/tenants", &admin, Body::empty()))
            .await
            .unwrap();
        last_status = response.status();
        if last_status == StatusCode::TOO_MANY_REQUESTS {
            assert!(response.headers().contains_key("retry-after"));
            return;
        }
    }
    panic!("expected a 429 within 61 requests, last status was {last_status}");
}
