//! Aggregate configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use vaultline_audit::AuditConfig;
use vaultline_cache::CacheConfig;
use vaultline_core::{Error, Result};
use vaultline_secrets::SecretsConfig;

/// Everything needed to start a [`crate::Vaultline`].
///
/// Every section has defaults, so a file only needs the values it changes.
/// Durations are written in milliseconds (`flush_interval_ms`, `ttl_ms`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultlineConfig {
    pub audit: AuditConfig,
    pub cache: CacheConfig,
    pub secrets: SecretsConfig,
}

impl VaultlineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Json {
            message: format!("invalid vaultline configuration: {e}"),
            source: e,
        })
    }

    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::file_system(path, "read configuration file", e))?;
        Self::from_json_str(&contents)
    }

    /// Validate every section, failing on the first problem.
    pub fn validate(&self) -> Result<()> {
        self.audit.validate()?;
        self.cache.validate()?;
        self.secrets.validate()
    }
}
