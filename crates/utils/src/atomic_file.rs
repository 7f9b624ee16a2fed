//! Atomic file replacement so a reader never observes a half-written file

use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use vaultline_core::{Error, Result};

/// Replace `path` with `content` by writing a sibling temporary file, syncing
/// it, then renaming it over the target.
pub async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    fs::create_dir_all(parent)
        .await
        .map_err(|e| Error::file_system(parent, "create parent directory", e))?;

    // Same directory, so the rename stays on one file system
    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));

    if let Err(e) = write_synced(&temp_path, content).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(Error::file_system(path, "atomic rename", e));
    }

    Ok(())
}

async fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| Error::file_system(path, "create temporary file", e))?;

    file.write_all(content)
        .await
        .map_err(|e| Error::file_system(path, "write temporary file", e))?;

    file.sync_all()
        .await
        .map_err(|e| Error::file_system(path, "sync temporary file", e))
}
