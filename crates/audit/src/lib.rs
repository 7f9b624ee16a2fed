//! Buffered, integrity-verified audit log writer
//!
//! Request handlers append [`AuditRecord`]s through an [`AuditBuffer`]. Every
//! record is sealed with a SHA-256 checksum when it is created; the buffer hands
//! batches to a pluggable [`AuditStorage`] sink when it fills up, when its flush
//! interval elapses, and once more on shutdown.
//!
//! ```no_run
//! # async fn demo() -> vaultline_core::Result<()> {
//! use std::sync::Arc;
//! use vaultline_audit::{AuditBuffer, AuditConfig, MemoryAuditStorage, RequestContext, RequestPayload};
//!
//! let buffer = AuditBuffer::new(AuditConfig::default(), Arc::new(MemoryAuditStorage::new()))?;
//! let audit_id = buffer.start_audit(RequestContext::new("tenant-1", "user-7"));
//! buffer.log_request(&audit_id, RequestPayload::new("GET", "/v1/orders")).await?;
//! buffer.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod checksum;
pub mod config;
pub mod metrics;
pub mod record;
pub mod storage;
pub mod testing;

pub use buffer::AuditBuffer;
pub use checksum::IntegrityReport;
pub use config::AuditConfig;
pub use metrics::AuditMetrics;
pub use record::*;
pub use storage::{AuditFilter, AuditStorage, FileAuditStorage, MemoryAuditStorage};
