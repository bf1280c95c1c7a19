//! The five policies seeded at startup, verbatim per the external interface
//! contract.

use serde_json::Value;

use super::model::{Condition, Operator, Policy, PolicyAction};

fn eq(field: &str, value: impl Into<Value>) -> Condition {
    Condition {
        field: field.to_owned(),
        operator: Operator::Eq,
        value: value.into(),
    }
}

#[must_use]
pub fn default_policies() -> Vec<Policy> {
    vec![
        Policy {
            id: "prevent-default-tenant-deletion".to_owned(),
            name: "Prevent default tenant deletion".to_owned(),
            description: "Prevents deletion of the default tenant".to_owned(),
            resource: "tenant".to_owned(),
            action: PolicyAction::Deny,
            priority: 100,
            enabled: true,
            conditions: vec![eq("tenant_id", "default"), eq("operation", "delete")],
        },
        Policy {
            id: "prevent-self-deletion".to_owned(),
            name: "Prevent self deletion".to_owned(),
            description: "Users cannot delete their own account".to_owned(),
            resource: "user".to_owned(),
            action: PolicyAction::Deny,
            priority: 95,
            enabled: true,
            conditions: vec![eq("operation", "delete"), eq("target_user_id", "${user_id}")],
        },
        Policy {
            id: "require-admin-tenant-create".to_owned(),
            name: "Require admin for tenant creation".to_owned(),
            description: "Only Admin callers may create tenants".to_owned(),
            resource: "tenant".to_owned(),
            action: PolicyAction::Deny,
            priority: 90,
            enabled: true,
            conditions: vec![eq("operation", "create"), Condition {
                field: "role".to_owned(),
                operator: Operator::Ne,
                value: "Admin".into(),
            }],
        },
        Policy {
            id: "rate-limit-expensive-ops".to_owned(),
            name: "Rate limit expensive operations".to_owned(),
            description: "Denies repeated snapshot/backup/restore operations".to_owned(),
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
        },
        Policy {
            id: "warn-large-operations".to_owned(),
            name: "Warn on large operations".to_owned(),
            description: "Flags operations touching a large number of records".to_owned(),
            resource: "operation".to_owned(),
            action: PolicyAction::Warn,
            priority: 50,
            enabled: true,
            conditions: vec![Condition {
                field: "record_count".to_owned(),
                operator: Operator::Gt,
                value: 10000.into(),
            }],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_default_policies_are_seeded() {
        assert_eq!(default_policies().len(), 5);
    }

    #[test]
    fn all_default_policies_start_enabled() {
        assert!(default_policies().iter().all(|p| p.enabled));
    }

    #[test]
    fn default_policy_ids_are_unique() {
        let policies = default_policies();
        let mut ids: Vec<&str> = policies.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), policies.len());
    }
}
