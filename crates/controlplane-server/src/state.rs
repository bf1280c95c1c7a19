//! Shared, `Arc`-wrapped handles to every collaborator the admission
//! pipeline and route handlers depend on. Built once at startup and cloned
//! cheaply into Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use controlplane::audit::AuditSink;
use controlplane::auth::VerifyToken;
use controlplane::config::AppConfig;
use controlplane::observability::Metrics;
use controlplane::policy::EvaluatePolicy;
use controlplane::proxy::ProxyToCore;
use controlplane::rate_limit::RateLimiter;
use controlplane::repository::{FetchTenant, UserRepository};

use crate::middleware::permission::PermissionMap;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub token_verifier: Arc<dyn VerifyToken>,
    pub rate_limiter: RateLimiter,
    pub policy_engine: Arc<dyn EvaluatePolicy>,
    pub audit: Arc<AuditSink>,
    pub core_proxy: Arc<dyn ProxyToCore>,
    pub tenants: Arc<dyn FetchTenant>,
    pub users: Arc<dyn UserRepository>,
    pub metrics: Arc<Metrics>,
    pub permissions: PermissionMap,
    pub started_at: Instant,
}
