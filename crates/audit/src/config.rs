//! Audit buffer configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use vaultline_core::duration::millis;
use vaultline_core::{Error, Result};

/// Default retention applied to each record's `ttl` (one year)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default lifetime of a request context that never sees its response
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Configuration for an [`crate::AuditBuffer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Records buffered before a synchronous flush is triggered
    pub buffer_size: usize,
    /// Hard ceiling while the sink is failing. Defaults to four times `buffer_size`.
    pub max_buffered_records: Option<usize>,
    /// Time-based flush trigger
    #[serde(rename = "flush_interval_ms", with = "millis")]
    pub flush_interval: Duration,
    /// Upper bound on a single `batch_store` call
    #[serde(rename = "flush_timeout_ms", with = "millis")]
    pub flush_timeout: Duration,
    /// How long the durable sink keeps a record
    #[serde(rename = "retention_ms", with = "millis")]
    pub retention: Duration,
    /// Request contexts older than this are dropped on the next flush tick
    #[serde(rename = "session_ttl_ms", with = "millis")]
    pub session_ttl: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            buffer_size: 100,
            max_buffered_records: None,
            flush_interval: Duration::from_secs(10),
            flush_timeout: Duration::from_secs(30),
            retention: DEFAULT_RETENTION,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

impl AuditConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_max_buffered_records(mut self, max: usize) -> Self {
        self.max_buffered_records = Some(max);
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    pub fn with_flush_timeout(mut self, flush_timeout: Duration) -> Self {
        self.flush_timeout = flush_timeout;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_session_ttl(mut self, session_ttl: Duration) -> Self {
        self.session_ttl = session_ttl;
        self
    }

    /// The effective overflow ceiling
    pub fn ceiling(&self) -> usize {
        self.max_buffered_records
            .unwrap_or_else(|| self.buffer_size.saturating_mul(4))
    }

    /// Reject configurations the buffer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::configuration("audit buffer_size must be positive"));
        }
        if self.ceiling() < self.buffer_size {
            return Err(Error::configuration(format!(
                "audit max_buffered_records ({}) must be at least buffer_size ({})",
                self.ceiling(),
                self.buffer_size
            )));
        }
        if self.flush_interval.is_zero() {
            return Err(Error::configuration("audit flush_interval must be positive"));
        }
        if self.flush_timeout.is_zero() {
            return Err(Error::configuration("audit flush_timeout must be positive"));
        }
        if self.session_ttl.is_zero() {
            return Err(Error::configuration("audit session_ttl must be positive"));
        }
        if self.retention.is_zero() || chrono::Duration::from_std(self.retention).is_err() {
            return Err(Error::configuration(
                "audit retention must be positive and representable as a timestamp offset",
            ));
        }
        Ok(())
    }
}
