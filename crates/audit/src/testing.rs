//! Test doubles for code that depends on [`AuditStorage`]

use crate::record::AuditRecord;
use crate::storage::{AuditFilter, AuditStorage, MemoryAuditStorage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use vaultline_core::{Error, Result};

/// In-memory sink that records every batch it receives and can be told to
/// fail or stall.
#[derive(Debug, Default)]
pub struct RecordingStorage {
    stored: MemoryAuditStorage,
    batches: Mutex<Vec<Vec<AuditRecord>>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    commit_delay: Mutex<Option<Duration>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail with a transient storage error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make subsequent writes sleep before completing
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Make subsequent writes persist the batch and then sleep before
    /// acknowledging it
    pub fn set_commit_delay(&self, delay: Option<Duration>) {
        *self.commit_delay.lock() = delay;
    }

    /// Successful batches, in the order they were written
    pub fn batches(&self) -> Vec<Vec<AuditRecord>> {
        self.batches.lock().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Write attempts, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<AuditRecord> {
        self.stored.records()
    }
}

#[async_trait]
impl AuditStorage for RecordingStorage {
    async fn store(&self, record: &AuditRecord) -> Result<()> {
        self.batch_store(std::slice::from_ref(record)).await
    }

    async fn batch_store(&self, records: &[AuditRecord]) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::storage("batch_store", "injected storage failure"));
        }

        self.batches.lock().push(records.to_vec());
        self.stored.batch_store(records).await?;

        let commit_delay = *self.commit_delay.lock();
        if let Some(delay) = commit_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        self.stored.query(filter).await
    }
}
