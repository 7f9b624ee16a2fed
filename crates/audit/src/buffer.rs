//! Bounded in-memory audit buffer with size and timer flush triggers
//!
//! ## Flushing
//!
//! A flush copies the buffered records out under the state lock, releases it,
//! writes the copy to the sink (bounded by `flush_timeout`), and only then
//! removes the written prefix. Appenders keep going while the sink is slow. At
//! most one flush runs at a time; flushes are serialized by the `in_flight`
//! slot, and since nothing else removes records the written prefix is always
//! exactly the copied batch.
//!
//! ## Failures and overflow
//!
//! A failed write leaves every record in place. Records keep being accepted
//! past `buffer_size` up to `max_buffered_records`; at that ceiling a `log_*`
//! call retries a flush once and, if the buffer is still full, returns
//! [`Error::BackPressure`] without appending.
//!
//! A write that outlives `flush_timeout` is reported as a timeout but is not
//! cancelled. The next flush first waits for it again: if it landed, its
//! records are retired without being written a second time; only a write
//! the sink reports as failed is retried.
//!
//! ## Sessions
//!
//! `start_audit` contexts are dropped by `log_response`, `end_audit`, the
//! flush tick once they are older than `session_ttl`, and `stop`.

use crate::checksum::{self, IntegrityReport};
use crate::config::AuditConfig;
use crate::metrics::{AuditMetrics, MetricsState};
use crate::record::{
    AuditPayload, AuditRecord, DataAccessPayload, RequestContext, RequestPayload,
    ResponsePayload, SecurityEventPayload,
};
use crate::storage::{AuditFilter, AuditStorage};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use vaultline_core::{generate_id, Error, IdSource, Result};
use vaultline_utils::PeriodicTask;

/// What caused a flush, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    /// The buffer reached `buffer_size`
    Full,
    /// The buffer hit its ceiling and an append is waiting
    Overflow,
    Timer,
    Manual,
    Shutdown,
}

/// A `batch_store` call still running after its flush gave up waiting
struct InFlight {
    handle: JoinHandle<Result<()>>,
    records: usize,
    started: Instant,
}

struct Session {
    context: RequestContext,
    started_at: Instant,
}

enum Push {
    Appended(usize),
    AtCeiling(AuditRecord),
}

#[derive(Default)]
struct BufferState {
    records: Vec<AuditRecord>,
    metrics: MetricsState,
    stopped: bool,
}

struct BufferInner {
    config: AuditConfig,
    retention: chrono::Duration,
    storage: Arc<dyn AuditStorage>,
    state: Mutex<BufferState>,
    /// Serializes flushes and holds a write that timed out but may still land
    in_flight: tokio::sync::Mutex<Option<InFlight>>,
    sessions: DashMap<String, Session>,
}

/// Buffered audit writer. Share it behind an `Arc`; every method takes `&self`.
pub struct AuditBuffer {
    inner: Arc<BufferInner>,
    flusher: PeriodicTask<Result<()>>,
}

impl AuditBuffer {
    /// Validate `config` and start the background flush task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: AuditConfig, storage: Arc<dyn AuditStorage>) -> Result<Self> {
        config.validate()?;
        let retention = chrono::Duration::from_std(config.retention)
            .map_err(|e| Error::configuration(format!("invalid audit retention: {e}")))?;

        let inner = Arc::new(BufferInner {
            config,
            retention,
            storage,
            state: Mutex::new(BufferState::default()),
            in_flight: tokio::sync::Mutex::new(None),
            sessions: DashMap::new(),
        });

        let tick_inner = Arc::clone(&inner);
        let drain_inner = Arc::clone(&inner);
        let flusher = PeriodicTask::spawn(
            "audit-flush",
            inner.config.flush_interval,
            move || {
                let inner = Arc::clone(&tick_inner);
                async move {
                    // Records stay buffered; the next trigger retries.
                    if let Err(e) = inner.flush(FlushTrigger::Timer).await {
                        tracing::warn!(error = %e, "background audit flush failed");
                    }
                    inner.expire_sessions();
                }
            },
            move || async move { drain_inner.flush(FlushTrigger::Shutdown).await.map(|_| ()) },
        );

        tracing::debug!(
            buffer_size = inner.config.buffer_size,
            ceiling = inner.config.ceiling(),
            flush_interval = ?inner.config.flush_interval,
            "audit buffer started"
        );

        Ok(Self { inner, flusher })
    }

    /// Begin an audit trail for one request and remember who made it.
    ///
    /// Later `log_*` calls with the returned id are stamped with the context's
    /// tenant and user. The association ends with [`Self::log_response`] or
    /// [`Self::end_audit`].
    pub fn start_audit(&self, context: RequestContext) -> String {
        let (audit_id, source) = generate_id("audit");
        if source == IdSource::Timestamp {
            tracing::warn!(%audit_id, "audit id generated without OS randomness");
        }
        self.inner.sessions.insert(
            audit_id.clone(),
            Session {
                context,
                started_at: Instant::now(),
            },
        );
        audit_id
    }

    /// Forget the request context associated with `audit_id`.
    pub fn end_audit(&self, audit_id: &str) {
        self.inner.sessions.remove(audit_id);
    }

    /// The context registered by [`Self::start_audit`], if still active
    pub fn context(&self, audit_id: &str) -> Option<RequestContext> {
        self.inner
            .sessions
            .get(audit_id)
            .map(|session| session.context.clone())
    }

    /// Request contexts currently registered
    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }

    pub async fn log_request(&self, audit_id: &str, payload: RequestPayload) -> Result<()> {
        self.log(audit_id, AuditPayload::Request(payload)).await
    }

    /// Record the response and end the audit trail's request context.
    ///
    /// The context is kept if the response is rejected with back-pressure, so
    /// a retry is still stamped with tenant and user.
    pub async fn log_response(&self, audit_id: &str, payload: ResponsePayload) -> Result<()> {
        let record = self.build_record(audit_id, AuditPayload::Response(payload))?;
        let buffered = self.inner.admit(record).await?;
        self.end_audit(audit_id);
        self.inner.flush_if_full(buffered).await
    }

    pub async fn log_data_access(&self, audit_id: &str, payload: DataAccessPayload) -> Result<()> {
        self.log(audit_id, AuditPayload::DataAccess(payload)).await
    }

    pub async fn log_security_event(
        &self,
        audit_id: &str,
        payload: SecurityEventPayload,
    ) -> Result<()> {
        self.log(audit_id, AuditPayload::SecurityEvent(payload)).await
    }

    /// Seal and append a record.
    ///
    /// If this append fills the buffer, the flush runs before returning and its
    /// error is returned. The record itself stays buffered in that case and will
    /// be written by a later flush.
    pub async fn log(&self, audit_id: &str, payload: AuditPayload) -> Result<()> {
        let record = self.build_record(audit_id, payload)?;
        let buffered = self.inner.admit(record).await?;
        self.inner.flush_if_full(buffered).await
    }

    /// Flush whatever is buffered now. Returns the number of records written.
    pub async fn flush(&self) -> Result<usize> {
        self.inner.flush(FlushTrigger::Manual).await
    }

    /// Stop the background task after a final flush and wait for it.
    ///
    /// `log_*` calls fail with [`Error::Stopped`] afterwards. If the final flush
    /// fails its error is returned and the records remain buffered; calling
    /// `stop` again retries the flush.
    pub async fn stop(&self) -> Result<()> {
        self.inner.state.lock().stopped = true;
        self.inner.sessions.clear();

        match self.flusher.stop().await {
            Ok(Some(result)) => result,
            Ok(None) => self.inner.flush(FlushTrigger::Shutdown).await.map(|_| ()),
            Err(e) => Err(Error::storage(
                "shutdown",
                format!("audit flush task did not complete: {e}"),
            )),
        }
    }

    /// Records of one audit trail (or any filter) from the durable sink.
    pub async fn query_audit_trail(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        self.inner.storage.query(filter).await
    }

    /// Recompute the checksum of every stored record of `audit_id`.
    ///
    /// Records still waiting in the buffer are not part of the report.
    pub async fn verify_integrity(&self, audit_id: &str) -> Result<IntegrityReport> {
        let records = self
            .inner
            .storage
            .query(&AuditFilter::for_audit(audit_id))
            .await?;
        let report = IntegrityReport::check(audit_id, &records)?;

        if !report.verified {
            tracing::error!(
                audit_id,
                corrupted = report.corrupted_records.len(),
                total = report.total_records,
                "audit trail failed integrity verification"
            );
        }
        Ok(report)
    }

    /// Buffered records not yet written to the sink
    pub fn pending(&self, filter: &AuditFilter) -> Vec<AuditRecord> {
        filter.apply(self.inner.state.lock().records.iter())
    }

    pub fn metrics(&self) -> AuditMetrics {
        let state = self.inner.state.lock();
        state.metrics.snapshot(state.records.len())
    }

    pub fn config(&self) -> &AuditConfig {
        &self.inner.config
    }

    fn build_record(&self, audit_id: &str, payload: AuditPayload) -> Result<AuditRecord> {
        let (tenant_id, user_id) = self
            .inner
            .sessions
            .get(audit_id)
            .map(|session| {
                (
                    session.context.tenant_id.clone(),
                    session.context.user_id.clone(),
                )
            })
            .unwrap_or_default();

        let (id, _) = generate_id("record");
        let timestamp = Utc::now();
        let ttl = timestamp
            .checked_add_signed(self.inner.retention)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut record = AuditRecord {
            id,
            audit_id: audit_id.to_string(),
            tenant_id,
            user_id,
            timestamp,
            ttl,
            payload,
            checksum: String::new(),
        };
        checksum::seal(&mut record)?;
        Ok(record)
    }
}

impl BufferInner {
    /// Append `record`, making room at the ceiling if the sink allows.
    /// Returns the number of buffered records after the append.
    async fn admit(&self, record: AuditRecord) -> Result<usize> {
        let record = match self.push(record)? {
            Push::Appended(len) => return Ok(len),
            Push::AtCeiling(record) => record,
        };

        if let Err(e) = self.flush(FlushTrigger::Overflow).await {
            tracing::debug!(error = %e, "overflow flush failed");
        }
        match self.push(record)? {
            Push::Appended(len) => Ok(len),
            Push::AtCeiling(record) => {
                let mut state = self.state.lock();
                state.metrics.record_rejected();
                let buffered = state.records.len();
                drop(state);

                tracing::warn!(
                    audit_id = %record.audit_id,
                    buffered,
                    "audit buffer at ceiling, rejecting record"
                );
                Err(Error::BackPressure {
                    buffered,
                    ceiling: self.config.ceiling(),
                })
            }
        }
    }

    async fn flush_if_full(&self, buffered: usize) -> Result<()> {
        if buffered >= self.config.buffer_size {
            self.flush(FlushTrigger::Full).await?;
        }
        Ok(())
    }

    fn push(&self, record: AuditRecord) -> Result<Push> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(Error::Stopped {
                component: "audit buffer",
            });
        }
        if state.records.len() >= self.config.ceiling() {
            return Ok(Push::AtCeiling(record));
        }

        state.records.push(record);
        state.metrics.record_logged();
        Ok(Push::Appended(state.records.len()))
    }

    fn expire_sessions(&self) {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now.duration_since(session.started_at) < self.config.session_ttl);
        let expired = before.saturating_sub(self.sessions.len());
        if expired > 0 {
            tracing::debug!(expired, "expired audit sessions without a response");
        }
    }

    async fn flush(&self, trigger: FlushTrigger) -> Result<usize> {
        let mut in_flight = self.in_flight.lock().await;
        let mut written = 0;

        if let Some(pending) = in_flight.take() {
            let (records, started) = (pending.records, pending.started);
            match self.wait_for_write(pending).await {
                // A failed earlier write is retried below with everything else.
                Ok(result) => {
                    if let Ok(count) = self.complete_write(trigger, records, started, result) {
                        written += count;
                    }
                }
                Err(pending) => {
                    *in_flight = Some(pending);
                    return Err(self.write_timed_out(trigger));
                }
            }
        }

        let batch = {
            let state = self.state.lock();
            // Another flush may have drained the buffer while we waited.
            if trigger == FlushTrigger::Full && state.records.len() < self.config.buffer_size {
                return Ok(written);
            }
            if state.records.is_empty() {
                return Ok(written);
            }
            state.records.clone()
        };

        let records = batch.len();
        let started = Instant::now();
        let storage = Arc::clone(&self.storage);
        let handle = tokio::spawn(async move { storage.batch_store(&batch).await });

        match self
            .wait_for_write(InFlight {
                handle,
                records,
                started,
            })
            .await
        {
            Ok(result) => self
                .complete_write(trigger, records, started, result)
                .map(|count| count + written),
            Err(pending) => {
                *in_flight = Some(pending);
                Err(self.write_timed_out(trigger))
            }
        }
    }

    /// Wait up to `flush_timeout` for a write. Gives the write back if it is
    /// still running.
    async fn wait_for_write(
        &self,
        mut write: InFlight,
    ) -> std::result::Result<Result<()>, InFlight> {
        match tokio::time::timeout(self.config.flush_timeout, &mut write.handle).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Ok(Err(Error::storage_with_source(
                "batch_store",
                "audit write task did not complete",
                e,
            ))),
            Err(_) => Err(write),
        }
    }

    fn write_timed_out(&self, trigger: FlushTrigger) -> Error {
        let e = Error::timeout("audit batch_store", self.config.flush_timeout);
        let mut state = self.state.lock();
        state.metrics.record_failure(e.to_string());
        let buffered = state.records.len();
        drop(state);

        tracing::warn!(
            ?trigger,
            buffered,
            "audit write still running after flush timeout, will not be rewritten"
        );
        e
    }

    /// Retire the first `records` buffered records if the write succeeded.
    fn complete_write(
        &self,
        trigger: FlushTrigger,
        records: usize,
        started: Instant,
        result: Result<()>,
    ) -> Result<usize> {
        let latency = started.elapsed();
        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                state.records.drain(..records);
                state.metrics.record_flush(records, latency);
                let remaining = state.records.len();
                drop(state);

                tracing::debug!(
                    ?trigger,
                    records,
                    remaining,
                    latency_ms = latency.as_millis() as u64,
                    "flushed audit records"
                );
                Ok(records)
            }
            Err(e) => {
                state.metrics.record_failure(e.to_string());
                let buffered = state.records.len();
                drop(state);

                tracing::warn!(
                    ?trigger,
                    error = %e,
                    buffered,
                    "audit flush failed, records kept for retry"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for AuditBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("AuditBuffer")
            .field("buffer_size", &self.inner.config.buffer_size)
            .field("buffered", &state.records.len())
            .field("stopped", &state.stopped)
            .finish()
    }
}
