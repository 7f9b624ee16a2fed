use super::{AuditFilter, AuditStorage};
use crate::record::AuditRecord;
use async_trait::async_trait;
use parking_lot::RwLock;
use vaultline_core::Result;

/// Process-local sink, for tests and single-instance deployments.
#[derive(Debug, Default)]
pub struct MemoryAuditStorage {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Snapshot of everything stored, in storage order
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }
}

#[async_trait]
impl AuditStorage for MemoryAuditStorage {
    async fn store(&self, record: &AuditRecord) -> Result<()> {
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn batch_store(&self, records: &[AuditRecord]) -> Result<()> {
        self.records.write().extend_from_slice(records);
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        Ok(filter.apply(self.records.read().iter()))
    }
}
