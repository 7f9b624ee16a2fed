use super::{generate_secret_value, SecretsProvider, DEFAULT_GENERATED_BYTES};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use vaultline_core::{Error, Result};
use zeroize::Zeroize;

type SecretMap = BTreeMap<String, String>;

/// Provider backed by a JSON object file (`{"name": "value", ...}`).
///
/// Every mutation rewrites the whole file atomically, so a crash never leaves a
/// partially written file behind. A missing file reads as empty.
pub struct FileSecretsProvider {
    path: PathBuf,
    generated_bytes: usize,
    write_lock: Mutex<()>,
}

impl FileSecretsProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            generated_bytes: DEFAULT_GENERATED_BYTES,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_generated_bytes(mut self, generated_bytes: usize) -> Self {
        self.generated_bytes = generated_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<SecretMap> {
        let mut bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SecretMap::new()),
            Err(e) => return Err(Error::file_system(&self.path, "read secrets file", e)),
        };
        let parsed = serde_json::from_slice(&bytes);
        bytes.zeroize();
        parsed.map_err(|e| Error::Provider {
            name: self.path.display().to_string(),
            operation: "load".to_string(),
            message: "secrets file is not a JSON object of strings".to_string(),
            source: Some(Box::new(e)),
        })
    }

    async fn save(&self, secrets: &SecretMap) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(secrets)?;
        let written = vaultline_utils::write_atomic(&self.path, &bytes).await;
        bytes.zeroize();
        written
    }
}

fn wipe(mut secrets: SecretMap) {
    for value in secrets.values_mut() {
        value.zeroize();
    }
}

impl std::fmt::Debug for FileSecretsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSecretsProvider")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl SecretsProvider for FileSecretsProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_secret(&self, name: &str) -> Result<String> {
        let mut secrets = self.load().await?;
        let found = secrets.remove(name);
        wipe(secrets);
        found.ok_or_else(|| Error::SecretNotFound {
            name: name.to_string(),
        })
    }

    async fn put_secret(&self, name: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut secrets = self.load().await?;
        if let Some(mut old) = secrets.insert(name.to_string(), value.to_string()) {
            old.zeroize();
        }
        let saved = self.save(&secrets).await;
        wipe(secrets);
        saved?;
        tracing::debug!(secret = name, path = %self.path.display(), "secret written");
        Ok(())
    }

    async fn rotate_secret(&self, name: &str) -> Result<String> {
        let _guard = self.write_lock.lock().await;
        let mut secrets = self.load().await?;
        if !secrets.contains_key(name) {
            wipe(secrets);
            return Err(Error::SecretNotFound {
                name: name.to_string(),
            });
        }

        let fresh = match generate_secret_value(self.name(), name, self.generated_bytes) {
            Ok(fresh) => fresh,
            Err(e) => {
                wipe(secrets);
                return Err(e);
            }
        };
        if let Some(current) = secrets.get_mut(name) {
            current.zeroize();
            current.clone_from(&fresh);
        }

        let saved = self.save(&secrets).await;
        wipe(secrets);
        saved?;
        tracing::info!(secret = name, path = %self.path.display(), "secret rotated");
        Ok(fresh)
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut secrets = self.load().await?;
        let Some(mut removed) = secrets.remove(name) else {
            wipe(secrets);
            return Ok(());
        };
        removed.zeroize();

        let saved = self.save(&secrets).await;
        wipe(secrets);
        saved
    }
}
