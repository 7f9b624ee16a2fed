//! Audit buffer metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Point-in-time view of an audit buffer's activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMetrics {
    /// Records accepted into the buffer
    pub records_logged: u64,
    /// Records durably written
    pub records_flushed: u64,
    /// Successful flushes
    pub flush_count: u64,
    pub failed_flushes: u64,
    /// Records refused because the buffer was at its ceiling
    pub rejected_records: u64,
    /// Records currently waiting for a flush
    pub buffered: usize,
    pub last_flush_at: Option<DateTime<Utc>>,
    pub last_flush_error: Option<String>,
    pub average_flush_latency: Duration,
}

/// Mutable counters kept next to the buffered records, under the same lock
#[derive(Debug, Default)]
pub(crate) struct MetricsState {
    snapshot: AuditMetrics,
    total_flush_latency: Duration,
}

impl MetricsState {
    pub(crate) fn record_logged(&mut self) {
        self.snapshot.records_logged += 1;
    }

    pub(crate) fn record_rejected(&mut self) {
        self.snapshot.rejected_records += 1;
    }

    pub(crate) fn record_flush(&mut self, records: usize, latency: Duration) {
        self.snapshot.flush_count += 1;
        self.snapshot.records_flushed += records as u64;
        self.snapshot.last_flush_at = Some(Utc::now());
        self.snapshot.last_flush_error = None;
        self.total_flush_latency += latency;
        let flushes = u32::try_from(self.snapshot.flush_count).unwrap_or(u32::MAX);
        self.snapshot.average_flush_latency = self.total_flush_latency / flushes;
    }

    pub(crate) fn record_failure(&mut self, error: String) {
        self.snapshot.failed_flushes += 1;
        self.snapshot.last_flush_error = Some(error);
    }

    pub(crate) fn snapshot(&self, buffered: usize) -> AuditMetrics {
        AuditMetrics {
            buffered,
            ..self.snapshot.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_latency() {
        let mut state = MetricsState::default();
        state.record_flush(3, Duration::from_millis(10));
        state.record_flush(1, Duration::from_millis(30));
        let snapshot = state.snapshot(0);
        assert_eq!(snapshot.flush_count, 2);
        assert_eq!(snapshot.records_flushed, 4);
        assert_eq!(snapshot.average_flush_latency, Duration::from_millis(20));
        assert!(snapshot.last_flush_at.is_some());
    }

    #[test]
    fn test_failure_then_success_clears_error() {
        let mut state = MetricsState::default();
        state.record_failure("sink down".to_string());
        assert_eq!(state.snapshot(2).last_flush_error.as_deref(), Some("sink down"));
        assert_eq!(state.snapshot(2).buffered, 2);

        state.record_flush(2, Duration::from_millis(1));
        let snapshot = state.snapshot(0);
        assert_eq!(snapshot.failed_flushes, 1);
        assert!(snapshot.last_flush_error.is_none());
    }
}
