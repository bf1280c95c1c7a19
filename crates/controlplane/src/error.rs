//! The error taxonomy and its translation to HTTP responses.
//!
//! Domain components (policy engine, repositories, token verifier) report
//! failures through their own `thiserror` enums; [`ControlPlaneError`] is the
//! single point where those get mapped onto a stable HTTP status and body
//! shape, matching the table every handler is expected to honor.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::auth::AuthError;
use crate::policy::PolicyError;
use crate::proxy::ProxyError;
use crate::repository::RepositoryError;

/// The stable error kinds a caller can see, each bound to exactly one HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("missing authorization header")]
    MissingAuth,
    #[error("malformed authorization header")]
    MalformedAuth,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is missing required claims")]
    MalformedClaims,
    #[error("caller lacks required permission")]
    PermissionDenied,
    #[error("policy denied the request: {policy_id}")]
    PolicyDeny {
        policy_id: String,
        message: String,
    },
    #[error("caller's tenant does not match the targeted tenant")]
    TenantMismatch,
    #[error("caller's tenant is not active")]
    TenantInactive,
    #[error("rate limit exceeded, retry after {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("downstream core service unreachable")]
    CoreUnavailable,
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ControlPlaneError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingAuth
            | Self::MalformedAuth
            | Self::InvalidSignature
            | Self::Expired
            | Self::MalformedClaims => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied
            | Self::PolicyDeny { .. }
            | Self::TenantMismatch
            | Self::TenantInactive => StatusCode::FORBIDDEN,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::CoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The stable `error` string clients match on.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingAuth
            | Self::MalformedAuth
            | Self::InvalidSignature
            | Self::Expired
            | Self::MalformedClaims => "unauthorized",
            Self::PermissionDenied
            | Self::PolicyDeny { .. }
            | Self::TenantMismatch
            | Self::TenantInactive => "forbidden",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::CoreUnavailable => "core_unavailable",
            Self::InternalError(_) => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for ControlPlaneError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "control plane internal error");
        } else {
            tracing::debug!(error = %self, status = %status, "control plane request rejected");
        }
        let (policy_id, retry_after) = match &self {
            Self::PolicyDeny { policy_id, .. } => (Some(policy_id.clone()), None),
            Self::RateLimitExceeded { retry_after } => (None, Some(*retry_after)),
            _ => (None, None),
        };
        let message = match &self {
            Self::PolicyDeny { message, .. } => message.clone(),
            _ => self.to_string(),
        };
        let body = ErrorBody {
            error: self.kind(),
            message,
            policy_id,
            retry_after,
        };
        let mut response = (status, Json(body)).into_response();
        if let Self::RateLimitExceeded { retry_after } = self {
            response
                .headers_mut()
                .insert("Retry-After", retry_after.into());
        }
        response
    }
}

impl From<AuthError> for ControlPlaneError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth => Self::MissingAuth,
            AuthError::MalformedAuth => Self::MalformedAuth,
            AuthError::InvalidSignature | AuthError::AlgorithmMismatch => Self::InvalidSignature,
            AuthError::Expired => Self::Expired,
            AuthError::MalformedClaims(_) => Self::MalformedClaims,
        }
    }
}

impl From<PolicyError> for ControlPlaneError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Repository(inner) => inner.into(),
        }
    }
}

impl From<RepositoryError> for ControlPlaneError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound(id),
            RepositoryError::Conflict(id) => Self::Conflict(id),
            RepositoryError::Invalid(msg) => Self::BadRequest(msg),
        }
    }
}

impl From<ProxyError> for ControlPlaneError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Unreachable => Self::CoreUnavailable,
            ProxyError::BuildRequest(msg) => Self::BadRequest(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_auth_maps_to_401_unauthorized() {
        let err = ControlPlaneError::MissingAuth;
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.kind(), "unauthorized");
    }

    #[test]
    fn policy_deny_maps_to_403_forbidden() {
        let err = ControlPlaneError::PolicyDeny {
            policy_id: "prevent-default-tenant-deletion".to_owned(),
            message: "Prevents deletion of the default tenant".to_owned(),
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.kind(), "forbidden");
    }

    #[test]
    fn rate_limit_exceeded_maps_to_429() {
        let err = ControlPlaneError::RateLimitExceeded { retry_after: 3 };
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn tenant_inactive_maps_to_403_forbidden() {
        let err = ControlPlaneError::TenantInactive;
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.kind(), "forbidden");
    }

    #[test]
    fn core_unavailable_maps_to_503() {
        assert_eq!(
            ControlPlaneError::CoreUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn proxy_unreachable_converts_to_core_unavailable() {
        let err: ControlPlaneError = crate::proxy::ProxyError::Unreachable.into();
        assert!(matches!(err, ControlPlaneError::CoreUnavailable));
    }

    #[tokio::test]
    async fn policy_deny_response_body_carries_the_policy_message() {
        let err = ControlPlaneError::PolicyDeny {
            policy_id: "prevent-default-tenant-deletion".to_owned(),
            message: "Prevents deletion of the default tenant".to_owned(),
        };
        let response = err.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Prevents deletion of the default tenant");
        assert_eq!(json["policy_id"], "prevent-default-tenant-deletion");
    }
}
