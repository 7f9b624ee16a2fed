//! Identifier generation
//!
//! Identifiers carry 128 random bits formatted as a UUID. When the operating
//! system's random source fails, generation degrades to a timestamp-derived
//! identifier instead of failing the caller: an audit trail with a weaker id is
//! preferred over a request that cannot be audited at all. The degraded path is
//! logged at `warn` so it is visible to operators.

use std::sync::atomic::{AtomicU64, Ordering};

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Where an identifier's uniqueness comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// 128 bits from the OS random source
    Random,
    /// Unix nanoseconds plus a process-local counter
    Timestamp,
}

/// Generate a fresh identifier.
pub fn generate_id(prefix: &str) -> (String, IdSource) {
    let mut bytes = [0u8; 16];
    id_from_random(prefix, getrandom::getrandom(&mut bytes).map(|()| bytes))
}

fn id_from_random(
    prefix: &str,
    random: Result<[u8; 16], getrandom::Error>,
) -> (String, IdSource) {
    match random {
        Ok(bytes) => (
            uuid::Builder::from_random_bytes(bytes).into_uuid().to_string(),
            IdSource::Random,
        ),
        Err(e) => {
            tracing::warn!(error = %e, "random source unavailable, using timestamp-derived id");
            (timestamp_id(prefix), IdSource::Timestamp)
        }
    }
}

fn timestamp_id(prefix: &str) -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    let counter = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{nanos}-{counter}")
}
