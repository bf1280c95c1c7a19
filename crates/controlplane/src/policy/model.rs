//! Declarative policy data types: rules, conditions, and the evaluation context.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    Allow,
    Deny,
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Contains,
    In,
}

/// `value` may be a literal or a closed-form template `${user_id}` /
/// `${tenant_id}`, resolved against the evaluation context at match time.
/// This set is intentionally not extensible into a general expression
/// language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub resource: String,
    pub action: PolicyAction,
    pub priority: i32,
    pub enabled: bool,
    pub conditions: Vec<Condition>,
}

/// Ephemeral, per-evaluation context. The engine never sees HTTP types —
/// the admission pipeline is responsible for filling `attributes` from
/// routing/path information before calling [`super::PolicyEngine::evaluate`].
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    pub resource: String,
    pub operation: String,
    pub user_id: String,
    pub tenant_id: String,
    pub role: String,
    pub attributes: HashMap<String, Value>,
}

impl PolicyContext {
    #[must_use]
    pub fn new(resource: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            operation: operation.into(),
            user_id: String::new(),
            tenant_id: String::new(),
            role: String::new(),
            attributes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// The engine's output for one evaluation: the admission decision plus the
/// policy that produced it, if any.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub allowed: bool,
    pub action: PolicyAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_policy_id: Option<String>,
    pub message: String,
}

impl Verdict {
    #[must_use]
    pub fn default_allow() -> Self {
        Self {
            allowed: true,
            action: PolicyAction::Allow,
            matched_policy_id: None,
            message: "default allow".to_owned(),
        }
    }
}
