//! Durable sinks for audit records

mod file;
mod memory;

pub use file::FileAuditStorage;
pub use memory::MemoryAuditStorage;

use crate::record::{AuditRecord, EntryType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vaultline_core::Result;

/// A durable home for audit records.
///
/// Implementations must keep the order of records within one `batch_store`
/// call, and `query` returns records in the order they were stored.
///
/// A `batch_store` that returns an error must not have persisted the batch:
/// the buffer writes the same records again on the next flush. A call that is
/// merely slow is never abandoned, only waited on again.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Persist a single record
    async fn store(&self, record: &AuditRecord) -> Result<()>;

    /// Persist a batch. The default stores records one by one.
    async fn batch_store(&self, records: &[AuditRecord]) -> Result<()> {
        for record in records {
            self.store(record).await?;
        }
        Ok(())
    }

    /// Return every stored record matching `filter`. No match is an empty `Vec`.
    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>>;
}

/// Selection criteria for [`AuditStorage::query`]. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub audit_id: Option<String>,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub entry_type: Option<EntryType>,
    /// Inclusive lower bound on `timestamp`
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `timestamp`
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_audit(audit_id: impl Into<String>) -> Self {
        Self {
            audit_id: Some(audit_id.into()),
            ..Self::default()
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn entry_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.audit_id.as_ref().map_or(true, |id| *id == record.audit_id)
            && self.user_id.as_ref().map_or(true, |id| *id == record.user_id)
            && self.tenant_id.as_ref().map_or(true, |id| *id == record.tenant_id)
            && self.entry_type.map_or(true, |t| t == record.entry_type())
            && self.since.map_or(true, |since| record.timestamp >= since)
            && self.until.map_or(true, |until| record.timestamp < until)
    }

    /// Keep matching records in order, honouring `limit`.
    pub fn apply<'a, I>(&self, records: I) -> Vec<AuditRecord>
    where
        I: IntoIterator<Item = &'a AuditRecord>,
    {
        records
            .into_iter()
            .filter(|record| self.matches(record))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AuditPayload, ResponsePayload, SecurityEventPayload, Severity};

    fn record(audit_id: &str, user_id: &str, payload: AuditPayload, minute: i64) -> AuditRecord {
        let base = DateTime::parse_from_rfc3339("2024-05-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        AuditRecord {
            id: format!("{audit_id}-{minute}"),
            audit_id: audit_id.to_string(),
            tenant_id: "tenant-1".to_string(),
            user_id: user_id.to_string(),
            timestamp: base + chrono::Duration::minutes(minute),
            ttl: base + chrono::Duration::days(365),
            payload,
            checksum: String::new(),
        }
    }

    #[test]
    fn test_filter_fields_combine() {
        let ok = AuditPayload::Response(ResponsePayload::new(200, 5));
        let alert = AuditPayload::SecurityEvent(SecurityEventPayload::new(
            "token_reuse",
            Severity::Critical,
            "refresh token replayed",
        ));
        let records = vec![
            record("a", "alice", ok.clone(), 0),
            record("a", "alice", alert.clone(), 1),
            record("b", "bob", ok.clone(), 2),
            record("b", "bob", alert, 3),
        ];

        let by_audit = AuditFilter::for_audit("a").apply(&records);
        assert_eq!(by_audit.len(), 2);

        let alerts_for_bob = AuditFilter::new()
            .user("bob")
            .entry_type(EntryType::SecurityEvent)
            .apply(&records);
        assert_eq!(alerts_for_bob.len(), 1);
        assert_eq!(alerts_for_bob[0].id, "b-3");

        let window = AuditFilter::new()
            .since(records[1].timestamp)
            .until(records[3].timestamp)
            .apply(&records);
        assert_eq!(
            window.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["a-1", "b-2"]
        );

        let limited = AuditFilter::new().tenant("tenant-1").limit(3).apply(&records);
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[0].id, "a-0");
    }
}
