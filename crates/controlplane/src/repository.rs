//! Abstract storage contracts for tenants and users, plus an in-memory
//! reference implementation seeding the undeletable `default` tenant at
//! startup.
//!
//! Replacing the in-memory implementation with a SQL-backed one must not
//! require any change to the components above it (token verifier, policy
//! engine, admission pipeline) — callers only ever see these traits.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{Tenant, User};
use crate::rate_limit::Tier;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
}

/// Small trait-like interface the admission pipeline and handlers depend on
/// for tenant lookups.
#[async_trait]
pub trait FetchTenant: Send + Sync {
    async fn get(&self, id: &str) -> Result<Tenant, RepositoryError>;
    async fn list(&self) -> Vec<Tenant>;
    async fn create(&self, tenant: Tenant) -> Result<Tenant, RepositoryError>;
    async fn update(&self, tenant: Tenant) -> Result<Tenant, RepositoryError>;
    /// Deletes a tenant. The `default` tenant can never be deleted this way —
    /// enforcement lives in the policy engine, but the repository also
    /// refuses as defense in depth.
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<User, RepositoryError>;
    async fn list(&self) -> Vec<User>;
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;
}

/// Reader-preferring in-memory tenant store. Readers hold the lock only long
/// enough to clone what they need; no lock is held across an await point.
pub struct InMemoryTenantRepository {
    tenants: RwLock<HashMap<String, Tenant>>,
}

impl InMemoryTenantRepository {
    #[must_use]
    pub fn new() -> Self {
        let mut tenants = HashMap::new();
        tenants.insert("default".to_owned(), Tenant::new("default", "Default Tenant", Tier::Unlimited));
        Self {
            tenants: RwLock::new(tenants),
        }
    }
}

impl Default for InMemoryTenantRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchTenant for InMemoryTenantRepository {
    async fn get(&self, id: &str) -> Result<Tenant, RepositoryError> {
        self.tenants
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("tenant '{id}' not found")))
    }

    async fn list(&self) -> Vec<Tenant> {
        self.tenants.read().values().cloned().collect()
    }

    async fn create(&self, tenant: Tenant) -> Result<Tenant, RepositoryError> {
        let mut guard = self.tenants.write();
        if guard.contains_key(&tenant.id) {
            return Err(RepositoryError::Conflict(format!(
                "tenant '{}' already exists",
                tenant.id
            )));
        }
        guard.insert(tenant.id.clone(), tenant.clone());
        Ok(tenant)
    }

    async fn update(&self, tenant: Tenant) -> Result<Tenant, RepositoryError> {
        let mut guard = self.tenants.write();
        if !guard.contains_key(&tenant.id) {
            return Err(RepositoryError::NotFound(format!(
                "tenant '{}' not found",
                tenant.id
            )));
        }
        guard.insert(tenant.id.clone(), tenant.clone());
        Ok(tenant)
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        if id == "default" {
            return Err(RepositoryError::Invalid("the default tenant cannot be deleted".to_owned()));
        }
        let mut guard = self.tenants.write();
        guard
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("tenant '{id}' not found")))
    }
}

pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Test/bootstrap helper: inserts a user directly.
    pub fn seed(&self, user: User) {
        self.users.write().insert(user.id.clone(), user);
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: &str) -> Result<User, RepositoryError> {
        self.users
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user '{id}' not found")))
    }

    async fn list(&self) -> Vec<User> {
        self.users.read().values().cloned().collect()
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let mut guard = self.users.write();
        guard
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("user '{id}' not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_tenant_exists_at_startup() {
        let repo = InMemoryTenantRepository::new();
        let tenant = repo.get("default").await.unwrap();
        assert_eq!(tenant.id, "default");
    }

    #[tokio::test]
    async fn default_tenant_cannot_be_deleted() {
        let repo = InMemoryTenantRepository::new();
        let err = repo.delete("default").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Invalid(_)));
    }

    #[tokio::test]
    async fn create_then_get_returns_same_tenant() {
        let repo = InMemoryTenantRepository::new();
        let tenant = Tenant::new("acme", "Acme Corp", Tier::Professional);
        repo.create(tenant.clone()).await.unwrap();
        let fetched = repo.get("acme").await.unwrap();
        assert_eq!(fetched.id, tenant.id);
    }

    #[tokio::test]
    async fn duplicate_create_is_conflict() {
        let repo = InMemoryTenantRepository::new();
        let tenant = Tenant::new("acme", "Acme Corp", Tier::Free);
        repo.create(tenant.clone()).await.unwrap();
        let err = repo.create(tenant).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn remove_then_lookup_is_not_found() {
        let repo = InMemoryTenantRepository::new();
        repo.create(Tenant::new("acme", "Acme Corp", Tier::Free)).await.unwrap();
        repo.delete("acme").await.unwrap();
        assert!(matches!(repo.get("acme").await, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn user_repository_delete_is_idempotent_in_effect() {
        let repo = InMemoryUserRepository::new();
        repo.seed(User {
            id: "u1".to_owned(),
            username: "alice".to_owned(),
            tenant_id: "acme".to_owned(),
            role: crate::identity::Role::Admin,
            is_api_key: false,
        });
        repo.delete("u1").await.unwrap();
        assert!(matches!(repo.delete("u1").await, Err(RepositoryError::NotFound(_))));
    }
}
