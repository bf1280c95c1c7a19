//! Roles, permissions, and the per-request identity the rest of the pipeline trusts.

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A role assigned to a user or service account.
///
/// The role → permission mapping is a fixed table (see [`Role::has_permission`]);
/// it is never configurable and never derived any other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Role {
    Admin,
    Developer,
    ReadOnly,
    ServiceAccount,
}

impl Role {
    /// Parses a role literal, rejecting anything not in the fixed set.
    ///
    /// # Errors
    /// Returns [`InvalidRole`](IdentityError::InvalidRole) for any string that is not
    /// one of `Admin`, `Developer`, `ReadOnly`, `ServiceAccount`.
    pub fn parse(literal: &str) -> Result<Self, IdentityError> {
        match literal {
            "Admin" => Ok(Self::Admin),
            "Developer" => Ok(Self::Developer),
            "ReadOnly" => Ok(Self::ReadOnly),
            "ServiceAccount" => Ok(Self::ServiceAccount),
            other => Err(IdentityError::InvalidRole {
                literal: other.to_owned(),
            }),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Developer => "Developer",
            Self::ReadOnly => "ReadOnly",
            Self::ServiceAccount => "ServiceAccount",
        }
    }

    /// Total function matching the fixed role/permission table. No other code path
    /// may derive permissions.
    #[must_use]
    pub fn has_permission(self, permission: Permission) -> bool {
        use Permission::{Admin, ManagePipelines, ManageSchemas, ManageTenants, Metrics, Read, Write};
        matches!(
            (self, permission),
            (Self::Admin, Read | Write | Admin | Metrics | ManageSchemas | ManagePipelines | ManageTenants)
                | (Self::Developer, Read | Write | Metrics | ManageSchemas | ManagePipelines)
                | (Self::ReadOnly, Read | Metrics)
                | (Self::ServiceAccount, Read | Write)
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability checked by the admission pipeline's permission guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    Read,
    Write,
    Admin,
    Metrics,
    ManageSchemas,
    ManagePipelines,
    ManageTenants,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid role literal: {literal}")]
    InvalidRole { literal: String },
}

/// Raw claims as decoded from a bearer token, before becoming an [`AuthContext`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub tenant_id: String,
    pub role: String,
    #[serde(default)]
    pub is_api_key: bool,
    pub exp: i64,
}

/// Immutable, per-request bundle of caller identity and tenant.
///
/// Built once by the token verifier and never mutated afterwards; every
/// downstream middleware and handler reads from the same value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: String,
    pub username: String,
    pub tenant_id: String,
    pub role: Role,
    pub is_api_key: bool,
    #[serde(skip)]
    bearer_token: Option<SecretString>,
}

impl AuthContext {
    #[must_use]
    pub fn builder() -> AuthContextBuilder {
        AuthContextBuilder::default()
    }

    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    /// The bearer token this context was built from, if the verifier retained it
    /// (needed by the core proxy to forward the caller's identity unchanged).
    #[must_use]
    pub fn bearer_token(&self) -> Option<&SecretString> {
        self.bearer_token.as_ref()
    }

    /// A synthetic, anonymous identity used only where authentication is
    /// explicitly disabled for single-tenant on-premise deployments.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            user_id: Uuid::nil().to_string(),
            username: "anonymous".to_owned(),
            tenant_id: "default".to_owned(),
            role: Role::Admin,
            is_api_key: false,
            bearer_token: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct AuthContextBuilder {
    user_id: Option<String>,
    username: Option<String>,
    tenant_id: Option<String>,
    role: Option<Role>,
    is_api_key: bool,
    bearer_token: Option<SecretString>,
}

impl AuthContextBuilder {
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    #[must_use]
    pub fn is_api_key(mut self, is_api_key: bool) -> Self {
        self.is_api_key = is_api_key;
        self
    }

    #[must_use]
    pub fn bearer_token(mut self, token: SecretString) -> Self {
        self.bearer_token = Some(token);
        self
    }

    /// # Errors
    /// Returns an error describing which required field is missing.
    pub fn build(self) -> Result<AuthContext, IdentityError> {
        Ok(AuthContext {
            user_id: self.user_id.ok_or(IdentityError::InvalidRole {
                literal: "<missing user_id>".to_owned(),
            })?,
            username: self.username.ok_or(IdentityError::InvalidRole {
                literal: "<missing username>".to_owned(),
            })?,
            tenant_id: self.tenant_id.ok_or(IdentityError::InvalidRole {
                literal: "<missing tenant_id>".to_owned(),
            })?,
            role: self.role.ok_or(IdentityError::InvalidRole {
                literal: "<missing role>".to_owned(),
            })?,
            is_api_key: self.is_api_key,
            bearer_token: self.bearer_token,
        })
    }
}
