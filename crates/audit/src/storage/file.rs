//! Append-only JSON-lines sink

use super::{AuditFilter, AuditStorage};
use crate::record::AuditRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use vaultline_core::{Error, Result};

/// Writes one JSON record per line. Every batch is written with a single
/// `write_all` followed by `sync_data`. A batch that fails part way is
/// truncated off again before the error is returned.
#[derive(Debug)]
pub struct FileAuditStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditStorage {
    /// Open (creating parent directories if needed) the log at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::file_system(parent, "create audit log directory", e))?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::file_system(&path, "open audit log", e))?;

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append_lines(&self, records: &[AuditRecord]) -> Result<()> {
        let mut payload = Vec::with_capacity(records.len() * 512);
        for record in records {
            serde_json::to_writer(&mut payload, record)?;
            payload.push(b'\n');
        }

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error("open audit log", e))?;
        let committed = file
            .metadata()
            .await
            .map_err(|e| self.io_error("stat audit log", e))?
            .len();

        let written = match file.write_all(&payload).await {
            Ok(()) => file
                .sync_data()
                .await
                .map_err(|e| self.io_error("sync audit log", e)),
            Err(e) => Err(self.io_error("write audit records", e)),
        };
        if written.is_err() {
            // A failed batch is rewritten by the caller; drop any partial tail.
            if let Err(e) = file.set_len(committed).await {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "could not roll back partial audit batch"
                );
            }
        }
        written
    }

    fn io_error(&self, operation: &str, source: std::io::Error) -> Error {
        Error::storage_with_source(
            operation,
            format!("audit log '{}' is unavailable", self.path.display()),
            source,
        )
    }
}

#[async_trait]
impl AuditStorage for FileAuditStorage {
    async fn store(&self, record: &AuditRecord) -> Result<()> {
        self.append_lines(std::slice::from_ref(record)).await
    }

    async fn batch_store(&self, records: &[AuditRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.append_lines(records).await
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        let file = fs::File::open(&self.path)
            .await
            .map_err(|e| self.io_error("open audit log for query", e))?;

        let mut lines = BufReader::new(file).lines();
        let mut matched = Vec::new();
        let mut line_number = 0usize;
        let limit = filter.limit.unwrap_or(usize::MAX);

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| self.io_error("read audit log line", e))?
        {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            // An unreadable line is corruption, not absence.
            let record: AuditRecord = serde_json::from_str(&line).map_err(|e| {
                Error::storage_with_source(
                    "query",
                    format!(
                        "corrupt audit record at {}:{line_number}",
                        self.path.display()
                    ),
                    e,
                )
            })?;

            if filter.matches(&record) {
                matched.push(record);
                if matched.len() >= limit {
                    break;
                }
            }
        }

        Ok(matched)
    }
}
