//! Tenant, quota, and user value objects owned by the repositories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Role;
use crate::rate_limit::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
    Deleted,
}

/// A ceiling on a tenant's consumption of one resource class. `None`
/// represents "no cap" (the `unlimited` tier's sentinel).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quotas {
    pub max_events_per_day: Option<u64>,
    pub max_storage_bytes: Option<u64>,
    pub max_queries_per_hour: Option<u64>,
    pub max_api_keys: Option<u64>,
    pub max_projections: Option<u64>,
    pub max_pipelines: Option<u64>,
}

impl Quotas {
    #[must_use]
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                max_events_per_day: Some(10_000),
                max_storage_bytes: Some(1_000_000_000),
                max_queries_per_hour: Some(100),
                max_api_keys: Some(2),
                max_projections: Some(5),
                max_pipelines: Some(2),
            },
            Tier::Standard => Self {
                max_events_per_day: Some(100_000),
                max_storage_bytes: Some(10_000_000_000),
                max_queries_per_hour: Some(1_000),
                max_api_keys: Some(10),
                max_projections: Some(25),
                max_pipelines: Some(10),
            },
            Tier::Professional => Self {
                max_events_per_day: Some(1_000_000),
                max_storage_bytes: Some(100_000_000_000),
                max_queries_per_hour: Some(10_000),
                max_api_keys: Some(50),
                max_projections: Some(200),
                max_pipelines: Some(50),
            },
            Tier::Unlimited | Tier::Dev => Self {
                max_events_per_day: None,
                max_storage_bytes: None,
                max_queries_per_hour: None,
                max_api_keys: None,
                max_projections: None,
                max_pipelines: None,
            },
        }
    }
}

/// Mutable usage counters tracked against a tenant's quotas.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TenantUsage {
    pub events_today: u64,
    pub storage_bytes: u64,
    pub queries_this_hour: u64,
    pub api_keys: u64,
    pub projections: u64,
    pub pipelines: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub tier: Tier,
    pub status: TenantStatus,
    pub quotas: Quotas,
    pub usage: TenantUsage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, tier: Tier) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            tier,
            status: TenantStatus::Active,
            quotas: Quotas::for_tier(tier),
            usage: TenantUsage::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// Normalizes and validates a tenant id against `^[a-z0-9][a-z0-9-]*$`.
#[must_use]
pub fn normalize_tenant_id(raw: &str) -> Option<String> {
    let normalized = raw.trim().to_lowercase();
    let mut chars = normalized.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '-');
    (first_ok && rest_ok).then_some(normalized)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub tenant_id: String,
    pub role: Role,
    pub is_api_key: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_tier_quotas_have_no_cap() {
        let quotas = Quotas::for_tier(Tier::Unlimited);
        assert!(quotas.max_events_per_day.is_none());
    }

    #[test]
    fn free_tier_quotas_are_capped() {
        let quotas = Quotas::for_tier(Tier::Free);
        assert_eq!(quotas.max_events_per_day, Some(10_000));
    }

    #[test]
    fn normalize_tenant_id_rejects_leading_hyphen() {
        assert!(normalize_tenant_id("-acme").is_none());
    }

    #[test]
    fn normalize_tenant_id_accepts_lowercase_alnum_and_hyphen() {
        assert_eq!(normalize_tenant_id("Acme-01").as_deref(), Some("acme-01"));
    }

    #[test]
    fn normalize_tenant_id_rejects_invalid_characters() {
        assert!(normalize_tenant_id("acme_01").is_none());
        assert!(normalize_tenant_id("acme!01").is_none());
    }

    #[test]
    fn new_tenant_is_active_by_default() {
        let tenant = Tenant::new("acme", "Acme Corp", Tier::Standard);
        assert!(tenant.is_active());
    }
}
