//! Audit record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The four kinds of audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Request,
    Response,
    DataAccess,
    SecurityEvent,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Request => write!(f, "request"),
            EntryType::Response => write!(f, "response"),
            EntryType::DataAccess => write!(f, "data_access"),
            EntryType::SecurityEvent => write!(f, "security_event"),
        }
    }
}

/// Inbound request details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub method: String,
    pub path: String,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    /// Header values must already be redacted by the caller
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
}

impl RequestPayload {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_source_ip(mut self, source_ip: impl Into<String>) -> Self {
        self.source_ip = Some(source_ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }
}

/// Outbound response details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub status_code: u16,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl ResponsePayload {
    pub fn new(status_code: u16, duration_ms: u64) -> Self {
        Self {
            status_code,
            duration_ms,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// What was done to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataAction {
    Read,
    Write,
    Delete,
    Export,
}

/// Access to a tenant-owned resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAccessPayload {
    pub resource_type: String,
    pub resource_id: String,
    pub action: DataAction,
    pub fields: Vec<String>,
    pub purpose: Option<String>,
}

impl DataAccessPayload {
    pub fn new(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        action: DataAction,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            action,
            fields: Vec::new(),
            purpose: None,
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }
}

/// Security event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A security-relevant occurrence (failed auth, rate limiting, tampering)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEventPayload {
    pub event_type: String,
    pub severity: Severity,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
}

impl SecurityEventPayload {
    pub fn new(
        event_type: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            severity,
            description: description.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The entry-specific part of a record. The variant is the entry type, so a
/// record always carries exactly one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry_type", rename_all = "snake_case")]
pub enum AuditPayload {
    Request(RequestPayload),
    Response(ResponsePayload),
    DataAccess(DataAccessPayload),
    SecurityEvent(SecurityEventPayload),
}

impl AuditPayload {
    pub const fn entry_type(&self) -> EntryType {
        match self {
            AuditPayload::Request(_) => EntryType::Request,
            AuditPayload::Response(_) => EntryType::Response,
            AuditPayload::DataAccess(_) => EntryType::DataAccess,
            AuditPayload::SecurityEvent(_) => EntryType::SecurityEvent,
        }
    }
}

/// One immutable audit trail entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique per record
    pub id: String,
    /// Correlates every record of one request or session
    pub audit_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    /// Retention horizon for the durable sink
    pub ttl: DateTime<Utc>,
    pub payload: AuditPayload,
    /// Hex SHA-256 over every other field, see [`crate::checksum`]
    pub checksum: String,
}

impl AuditRecord {
    pub const fn entry_type(&self) -> EntryType {
        self.payload.entry_type()
    }
}

/// Caller identity captured when an audit trail is started
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: String,
    pub user_id: String,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serializes_with_entry_type_tag() {
        let payload = AuditPayload::DataAccess(
            DataAccessPayload::new("customer", "c-42", DataAction::Export)
                .with_fields(["email", "phone"]),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["entry_type"], "data_access");
        assert_eq!(json["action"], "export");
        assert_eq!(json["fields"][1], "phone");

        let back: AuditPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
        assert_eq!(back.entry_type(), EntryType::DataAccess);
    }

    #[test]
    fn test_entry_type_display_matches_serde() {
        for entry_type in [
            EntryType::Request,
            EntryType::Response,
            EntryType::DataAccess,
            EntryType::SecurityEvent,
        ] {
            let json = serde_json::to_string(&entry_type).unwrap();
            assert_eq!(json, format!("\"{entry_type}\""));
        }
    }
}
