//! Append-only, structured audit trail.
//!
//! One record per call, newline-delimited JSON, with guaranteed
//! serialization per writer: concurrent callers never interleave within a
//! record. A sink with no configured target accepts every call and writes
//! nothing — audit failure must never fail the caller's request.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};

/// A single append-only audit record. Once written, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: chrono::DateTime<Utc>,
    pub event_type: String,
    pub action: String,
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(event_type: impl Into<String>, action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type: event_type.into(),
            action: action.into(),
            resource: resource.into(),
            resource_id: None,
            user_id: None,
            username: None,
            tenant_id: None,
            method: None,
            path: None,
            status_code: None,
            duration_ms: None,
            ip_address: None,
            user_agent: None,
            error: None,
            metadata: Map::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to write audit event: {0}")]
pub struct AuditWriteError(String);

/// Append-only, structured audit trail. Disabled (no-op) when constructed
/// without a target path.
pub struct AuditSink {
    writer: Option<Mutex<File>>,
}

impl AuditSink {
    /// A sink that accepts every call and writes nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self { writer: None }
    }

    /// Opens (creating if needed) an append-only newline-delimited JSON log
    /// at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened for append.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Some(Mutex::new(file)),
        })
    }

    /// Writes one audit record. Always returns `Ok` to the caller even on
    /// I/O failure — the failure is reported to stderr and, via the returned
    /// `Err`, to the pipeline's own error channel, but it never propagates as
    /// a request failure.
    ///
    /// # Errors
    /// Returns [`AuditWriteError`] when the underlying store rejects the
    /// write; callers must treat this as non-fatal to the request.
    pub fn log(&self, event: &AuditEvent) -> Result<(), AuditWriteError> {
        let Some(writer) = &self.writer else {
            return Ok(());
        };
        let mut line = serde_json::to_string(event).map_err(|e| AuditWriteError(e.to_string()))?;
        line.push('\n');

        let mut file = writer.lock();
        if let Err(err) = file.write_all(line.as_bytes()) {
            eprintln!("audit sink write failed: {err}");
            return Err(AuditWriteError(err.to_string()));
        }
        Ok(())
    }

    pub fn log_auth_event(
        &self,
        event_type: &str,
        user_id: &str,
        username: &str,
        tenant_id: &str,
        details: &str,
    ) -> Result<(), AuditWriteError> {
        let mut event = AuditEvent::new(event_type, "authenticate", "auth");
        event.user_id = Some(user_id.to_owned());
        event.username = Some(username.to_owned());
        event.tenant_id = Some(tenant_id.to_owned());
        if !details.is_empty() {
            event.metadata.insert("details".to_owned(), Value::String(details.to_owned()));
        }
        self.log(&event)
    }

    pub fn log_tenant_event(
        &self,
        action: &str,
        tenant_id: &str,
        actor_user_id: &str,
        details: &str,
    ) -> Result<(), AuditWriteError> {
        let mut event = AuditEvent::new("tenant_management", action, "tenant");
        event.resource_id = Some(tenant_id.to_owned());
        event.tenant_id = Some(tenant_id.to_owned());
        event.user_id = Some(actor_user_id.to_owned());
        if !details.is_empty() {
            event.metadata.insert("details".to_owned(), Value::String(details.to_owned()));
        }
        self.log(&event)
    }

    pub fn log_operation_event(
        &self,
        operation: &str,
        resource_id: &str,
        actor_user_id: &str,
        status: &str,
    ) -> Result<(), AuditWriteError> {
        let mut event = AuditEvent::new("operation", operation, "operation");
        event.resource_id = Some(resource_id.to_owned());
        event.user_id = Some(actor_user_id.to_owned());
        event
            .metadata
            .insert("status".to_owned(), Value::String(status.to_owned()));
        self.log(&event)
    }
}

/// Derives the `action` field of an `api_request` event from the HTTP method
/// and path, per the fixed derivation table.
#[must_use]
pub fn derive_action(method: &str, path: &str) -> &'static str {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let last = segments.last().copied().unwrap_or("");
    match (method, last) {
        ("POST", "login") => "login",
        ("POST", "register") => "register",
        ("GET", _) => "read",
        ("POST", _) => "create",
        ("PUT", _) => "update",
        ("PATCH", _) => "modify",
        ("DELETE", _) => "delete",
        _ => "unknown",
    }
}

/// Derives the `resource` field of an `api_request` event from the path,
/// matching against path *segments* (never a raw substring).
#[must_use]
pub fn derive_resource(path: &str) -> &'static str {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for segment in segments {
        let resource = match segment {
            "tenants" => "tenant",
            "users" => "user",
            "snapshots" => "snapshot",
            "backups" => "backup",
            "cluster" => "cluster",
            "operations" => "operation",
            _ => continue,
        };
        return resource;
    }
    "unknown"
}
