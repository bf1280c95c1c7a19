//! The admission pipeline's middleware stack, composed in [`crate::pipeline`].

pub mod audit_observability;
pub mod auth;
pub mod permission;
pub mod policy;
pub mod rate_limit;
pub mod tenant_isolation;

/// Paths exempt from rate limiting and token verification per §4.6.
pub const EXEMPT_PATHS: &[&str] = &["/health", "/metrics"];

/// Paths additionally exempt from token verification only (forwarded to the
/// core unauthenticated).
pub const AUTH_EXEMPT_PATHS: &[&str] = &["/api/v1/auth/login", "/api/v1/auth/register"];

#[must_use]
pub fn is_exempt(path: &str, exemptions: &[&str]) -> bool {
    exemptions.iter().any(|p| *p == path)
}
