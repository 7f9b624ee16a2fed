//! Tamper detection for audit records
//!
//! The digest is SHA-256 over the canonical JSON form of a record with the
//! `checksum` field left out, hex encoded. Maps inside payloads are ordered, so
//! equal records always serialize to the same bytes.

use crate::record::{AuditPayload, AuditRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vaultline_core::{Error, Result};

/// Every record field except `checksum`, borrowed.
#[derive(Serialize)]
struct ChecksumInput<'a> {
    id: &'a str,
    audit_id: &'a str,
    tenant_id: &'a str,
    user_id: &'a str,
    timestamp: &'a DateTime<Utc>,
    ttl: &'a DateTime<Utc>,
    payload: &'a AuditPayload,
}

impl<'a> From<&'a AuditRecord> for ChecksumInput<'a> {
    fn from(record: &'a AuditRecord) -> Self {
        Self {
            id: &record.id,
            audit_id: &record.audit_id,
            tenant_id: &record.tenant_id,
            user_id: &record.user_id,
            timestamp: &record.timestamp,
            ttl: &record.ttl,
            payload: &record.payload,
        }
    }
}

/// Compute the digest of `record`, ignoring its current `checksum`.
pub fn compute(record: &AuditRecord) -> Result<String> {
    let canonical = serde_json::to_vec(&ChecksumInput::from(record)).map_err(|e| Error::Json {
        message: format!("failed to serialize audit record '{}' for checksum", record.id),
        source: e,
    })?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Compute and store the checksum on `record`.
pub fn seal(record: &mut AuditRecord) -> Result<()> {
    record.checksum = compute(record)?;
    Ok(())
}

/// Recompute and compare. Returns an integrity error on mismatch.
pub fn verify(record: &AuditRecord) -> Result<()> {
    let actual = compute(record)?;
    if actual == record.checksum {
        Ok(())
    } else {
        Err(Error::Integrity {
            record_id: record.id.clone(),
            expected: record.checksum.clone(),
            actual,
        })
    }
}

/// Outcome of checking every record of one audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub audit_id: String,
    pub total_records: usize,
    /// Ids of records whose checksum did not match
    pub corrupted_records: Vec<String>,
    pub verified: bool,
}

impl IntegrityReport {
    pub fn check(audit_id: impl Into<String>, records: &[AuditRecord]) -> Result<Self> {
        let mut corrupted_records = Vec::new();
        for record in records {
            match verify(record) {
                Ok(()) => {}
                Err(Error::Integrity { record_id, .. }) => corrupted_records.push(record_id),
                Err(e) => return Err(e),
            }
        }

        Ok(Self {
            audit_id: audit_id.into(),
            total_records: records.len(),
            verified: corrupted_records.is_empty(),
            corrupted_records,
        })
    }
}
