//! Layered configuration loading

use crate::config::VaultlineConfig;
use crate::env;
use std::path::PathBuf;
use vaultline_core::Result;

/// Builds a [`VaultlineConfig`] from defaults, then an optional JSON file,
/// then environment variables, validating the result.
pub struct ConfigLoader {
    /// JSON file to read. Missing is an error when set.
    file: Option<PathBuf>,
    /// Whether `VAULTLINE_*` variables are applied
    use_env: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            use_env: true,
        }
    }

    /// Read this JSON file on top of the defaults
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Set whether environment variables are applied
    pub fn use_env(mut self, use_env: bool) -> Self {
        self.use_env = use_env;
        self
    }

    /// Load and validate the configuration
    pub async fn load(self) -> Result<VaultlineConfig> {
        let mut config = match &self.file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration file");
                VaultlineConfig::from_json_file(path).await?
            }
            None => VaultlineConfig::default(),
        };

        if self.use_env {
            env::apply_process_env(&mut config)?;
        }

        config.validate()?;
        tracing::debug!(
            buffer_size = config.audit.buffer_size,
            flush_interval_ms = config.audit.flush_interval.as_millis() as u64,
            cache_ttl_ms = config.cache.ttl.as_millis() as u64,
            secrets_file = ?config.secrets.file,
            "configuration loaded"
        );
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
