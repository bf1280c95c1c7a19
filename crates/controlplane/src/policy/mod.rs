//! The policy engine: a small declarative rules runtime with priority
//! ordering, conditional matching, closed-form variable interpolation, and
//! three verdicts (allow/warn/deny).
//!
//! The engine itself has no runtime failures; misconfigured policies simply
//! fail to match, which is safe because the default verdict is allow.
//! Repository I/O errors on add/remove/update are the only way this module
//! surfaces an error.

mod model;

pub use model::{Condition, Operator, Policy, PolicyAction, PolicyContext, Verdict};

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Small trait-like interface the admission pipeline depends on.
#[async_trait]
pub trait EvaluatePolicy: Send + Sync {
    fn evaluate(&self, ctx: &PolicyContext) -> Verdict;
    async fn add(&self, policy: Policy) -> Result<(), PolicyError>;
    async fn remove(&self, id: &str) -> Result<(), PolicyError>;
    async fn get(&self, id: &str) -> Result<Policy, PolicyError>;
    fn list(&self) -> Vec<Policy>;
}

/// Reference implementation: policies live in a concurrent map, readable by
/// many evaluators at once. `DashMap`'s sharding gives the "many readers, one
/// exclusive writer per shard" discipline the concurrency model calls for
/// without a single global lock.
pub struct PolicyEngine {
    policies: Arc<DashMap<String, Policy>>,
}

impl PolicyEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            policies: Arc::new(DashMap::new()),
        }
    }

    #[must_use]
    pub fn seeded_with_defaults() -> Self {
        let engine = Self::new();
        for policy in defaults::default_policies() {
            engine.policies.insert(policy.id.clone(), policy);
        }
        engine
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvaluatePolicy for PolicyEngine {
    fn evaluate(&self, ctx: &PolicyContext) -> Verdict {
        // Snapshot enabled policies for this resource; evaluation runs on the
        // snapshot with no lock held, so concurrent add/remove cannot affect
        // one walk mid-flight.
        let mut candidates: Vec<Policy> = self
            .policies
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|p| p.enabled && p.resource == ctx.resource)
            .collect();

        // Descending priority. Equal-priority order is whatever `sort_by`'s
        // stable sort preserves from iteration order — undefined but stable
        // within this one snapshot, matching the documented tie-break policy.
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));

        for policy in &candidates {
            if conditions_match(&policy.conditions, ctx) {
                return match policy.action {
                    PolicyAction::Deny => Verdict {
                        allowed: false,
                        action: PolicyAction::Deny,
                        matched_policy_id: Some(policy.id.clone()),
                        message: policy.description.clone(),
                    },
                    PolicyAction::Warn => Verdict {
                        allowed: true,
                        action: PolicyAction::Warn,
                        matched_policy_id: Some(policy.id.clone()),
                        message: policy.description.clone(),
                    },
                    PolicyAction::Allow => Verdict {
                        allowed: true,
                        action: PolicyAction::Allow,
                        matched_policy_id: Some(policy.id.clone()),
                        message: policy.description.clone(),
                    },
                };
            }
        }
        Verdict::default_allow()
    }

    async fn add(&self, policy: Policy) -> Result<(), PolicyError> {
        self.policies.insert(policy.id.clone(), policy);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), PolicyError> {
        self.policies
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_owned()).into())
    }

    async fn get(&self, id: &str) -> Result<Policy, PolicyError> {
        self.policies
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RepositoryError::NotFound(id.to_owned()).into())
    }

    fn list(&self) -> Vec<Policy> {
        self.policies.iter().map(|e| e.value().clone()).collect()
    }
}

/// All conditions within one policy are ANDed; a policy with zero conditions
/// always matches its resource.
fn conditions_match(conditions: &[Condition], ctx: &PolicyContext) -> bool {
    conditions.iter().all(|c| condition_match(c, ctx))
}

fn condition_match(condition: &Condition, ctx: &PolicyContext) -> bool {
    let Some(left) = resolve_field(&condition.field, ctx) else {
        return false;
    };
    let right = resolve_value(&condition.value, ctx);

    match condition.operator {
        Operator::Eq => stringify(&left) == stringify(&right),
        Operator::Ne => stringify(&left) != stringify(&right),
        Operator::Gt => match (as_f64(&left), as_f64(&right)) {
            (Some(l), Some(r)) => l > r,
            _ => false,
        },
        Operator::Lt => match (as_f64(&left), as_f64(&right)) {
            (Some(l), Some(r)) => l < r,
            _ => false,
        },
        Operator::Contains => stringify(&left).contains(&stringify(&right)),
        Operator::In => match &right {
            Value::Array(items) => items.iter().any(|item| stringify(item) == stringify(&left)),
            other => stringify(&left) == stringify(other),
        },
    }
}

/// Named fields come from the context's typed slots; anything else is
/// looked up in `ctx.attributes`. A missing attribute fails the condition.
fn resolve_field(field: &str, ctx: &PolicyContext) -> Option<Value> {
    match field {
        "operation" => Some(Value::String(ctx.operation.clone())),
        "user_id" => Some(Value::String(ctx.user_id.clone())),
        "tenant_id" => Some(Value::String(ctx.tenant_id.clone())),
        "role" => Some(Value::String(ctx.role.clone())),
        other => ctx.attributes.get(other).cloned(),
    }
}

/// Substitutes `${user_id}` / `${tenant_id}` templates; any other literal
/// value passes through unchanged. Deliberately a closed set — never a
/// general expression language.
fn resolve_value(value: &Value, ctx: &PolicyContext) -> Value {
    if let Value::String(s) = value {
        match s.as_str() {
            "${user_id}" => return Value::String(ctx.user_id.clone()),
            "${tenant_id}" => return Value::String(ctx.tenant_id.clone()),
            _ => {}
        }
    }
    value.clone()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

pub mod defaults;

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(field: &str, value: impl Into<Value>) -> Condition {
        Condition {
            field: field.to_owned(),
            operator: Operator::Eq,
            value: value.into(),
        }
    }

    #[tokio::test]
    async fn no_matching_policy_returns_default_allow() {
        let engine = PolicyEngine::new();
        let ctx = PolicyContext::new("tenant", "read");
        let verdict = engine.evaluate(&ctx);
        assert!(verdict.allowed);
        assert_eq!(verdict.action, PolicyAction::Allow);
        assert!(verdict.matched_policy_id.is_none());
    }

    #[tokio::test]
    async fn higher_priority_deny_overrides_lower_priority_allow() {
        let engine = PolicyEngine::new();
        engine
            .add(Policy {
                id: "low-allow".to_owned(),
                name: "low".to_owned(),
                description: "low priority allow".to_owned(),
                resource: "tenant".to_owned(),
                action: PolicyAction::Allow,
                priority: 10,
                enabled: true,
                conditions: vec![],
            })
            .await
            .unwrap();
        engine
            .add(Policy {
                id: "high-deny".to_owned(),
                name: "high".to_owned(),
                description: "high priority deny".to_owned(),
                resource: "tenant".to_owned(),
                action: PolicyAction::Deny,
                priority: 90,
                enabled: true,
                conditions: vec![],
            })
            .await
            .unwrap();

        let ctx = PolicyContext::new("tenant", "delete");
        let verdict = engine.evaluate(&ctx);
        assert!(!verdict.allowed);
        assert_eq!(verdict.matched_policy_id.as_deref(), Some("high-deny"));
    }

    #[tokio::test]
    async fn disabled_policy_never_matches() {
        let engine = PolicyEngine::new();
        engine
            .add(Policy {
                id: "disabled-deny".to_owned(),
                name: "disabled".to_owned(),
                description: "disabled".to_owned(),
                resource: "tenant".to_owned(),
                action: PolicyAction::Deny,
                priority: 100,
                enabled: false,
                conditions: vec![],
            })
            .await
            .unwrap();
        let verdict = engine.evaluate(&PolicyContext::new("tenant", "delete"));
        assert!(verdict.allowed);
    }

    #[tokio::test]
    async fn template_substitution_resolves_user_id() {
        let engine = PolicyEngine::new();
        engine
            .add(Policy {
                id: "self-delete".to_owned(),
                name: "self delete".to_owned(),
                description: "cannot delete self".to_owned(),
                resource: "user".to_owned(),
                action: PolicyAction::Deny,
                priority: 95,
                enabled: true,
                conditions: vec![
                    eq("operation", "delete"),
                    eq("target_user_id", "${user_id}"),
                ],
            })
            .await
            .unwrap();

        let ctx = PolicyContext::new("user", "delete")
            .user_id("u1")
            .attribute("target_user_id", "u1");
        let verdict = engine.evaluate(&ctx);
        assert!(!verdict.allowed);

        let ctx_other = PolicyContext::new("user", "delete")
            .user_id("u1")
            .attribute("target_user_id", "u2");
        let verdict_other = engine.evaluate(&ctx_other);
        assert!(verdict_other.allowed);
    }

    #[tokio::test]
    async fn missing_attribute_fails_condition() {
        let engine = PolicyEngine::new();
        engine
            .add(Policy {
                id: "needs-attr".to_owned(),
                name: "needs attr".to_owned(),
                description: "deny if flagged".to_owned(),
                resource: "operation".to_owned(),
                action: PolicyAction::Deny,
                priority: 50,
                enabled: true,
                conditions: vec![eq("flagged", true)],
            })
            .await
            .unwrap();
        let verdict = engine.evaluate(&PolicyContext::new("operation", "run"));
        assert!(verdict.allowed);
    }

    #[tokio::test]
    async fn gt_operator_numeric_comparison() {
        let engine = PolicyEngine::new();
        engine
            .add(Policy {
                id: "warn-large".to_owned(),
                name: "warn large".to_owned(),
                description: "warn on large record counts".to_owned(),
                resource: "operation".to_owned(),
                action: PolicyAction::Warn,
                priority: 50,
                enabled: true,
                conditions: vec![Condition {
                    field: "record_count".to_owned(),
                    operator: Operator::Gt,
                    value: 10000.into(),
                }],
            })
            .await
            .unwrap();

        let small = PolicyContext::new("operation", "bulk_delete").attribute("record_count", 100);
        assert_eq!(engine.evaluate(&small).action, PolicyAction::Allow);

        let large = PolicyContext::new("operation", "bulk_delete").attribute("record_count", 15000);
        let verdict = engine.evaluate(&large);
        assert_eq!(verdict.action, PolicyAction::Warn);
        assert!(verdict.allowed);
    }

    #[tokio::test]
    async fn in_operator_matches_list_membership() {
        let engine = PolicyEngine::new();
        engine
            .add(Policy {
                id: "expensive-ops".to_owned(),
                name: "expensive ops".to_owned(),
                description: "deny repeated expensive ops".to_owned(),
                resource: "operation".to_owned(),
                action: PolicyAction::Deny,
                priority: 80,
                enabled: true,
                conditions: vec![
                    Condition {
                        field: "operation_type".to_owned(),
                        operator: Operator::In,
                        value: Value::Array(vec!["snapshot".into(), "backup".into(), "restore".into()]),
                    },
                    Condition {
                        field: "recent_operations".to_owned(),
                        operator: Operator::Gt,
                        value: 5.into(),
                    },
                ],
            })
            .await
            .unwrap();

        let ctx = PolicyContext::new("operation", "snapshot")
            .attribute("operation_type", "snapshot")
            .attribute("recent_operations", 8);
        assert!(!engine.evaluate(&ctx).allowed);

        let ctx_ok = PolicyContext::new("operation", "snapshot")
            .attribute("operation_type", "snapshot")
            .attribute("recent_operations", 2);
        assert!(engine.evaluate(&ctx_ok).allowed);
    }

    #[tokio::test]
    async fn contains_operator_is_substring_check() {
        let condition = Condition {
            field: "path".to_owned(),
            operator: Operator::Contains,
            value: "admin".into(),
        };
        let ctx = PolicyContext::new("tenant", "read").attribute("path", "/api/v1/tenants-admin");
        assert!(condition_match(&condition, &ctx));
    }

    #[tokio::test]
    async fn policy_with_zero_conditions_always_matches_its_resource() {
        let engine = PolicyEngine::new();
        engine
            .add(Policy {
                id: "deny-all-ops".to_owned(),
                name: "deny all".to_owned(),
                description: "deny all ops on this resource".to_owned(),
                resource: "operation".to_owned(),
                action: PolicyAction::Deny,
                priority: 10,
                enabled: true,
                conditions: vec![],
            })
            .await
            .unwrap();
        assert!(!engine.evaluate(&PolicyContext::new("operation", "anything")).allowed);
    }

    #[tokio::test]
    async fn remove_then_lookup_is_not_found() {
        let engine = PolicyEngine::new();
        engine
            .add(Policy {
                id: "p1".to_owned(),
                name: "p1".to_owned(),
                description: String::new(),
                resource: "tenant".to_owned(),
                action: PolicyAction::Allow,
                priority: 1,
                enabled: true,
                conditions: vec![],
            })
            .await
            .unwrap();
        engine.remove("p1").await.unwrap();
        assert!(engine.get("p1").await.is_err());
    }

    #[tokio::test]
    async fn evaluating_same_context_twice_without_mutation_is_stable() {
        let engine = PolicyEngine::seeded_with_defaults();
        let ctx = PolicyContext::new("tenant", "delete")
            .tenant_id("default")
            .role("Admin");
        let first = engine.evaluate(&ctx);
        let second = engine.evaluate(&ctx);
        assert_eq!(first.matched_policy_id, second.matched_policy_id);
        assert_eq!(first.allowed, second.allowed);
    }
}
