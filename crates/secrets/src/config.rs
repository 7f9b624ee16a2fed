//! Secrets provider configuration

use crate::provider::{
    FileSecretsProvider, MemorySecretsProvider, SecretsProvider, DEFAULT_GENERATED_BYTES,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use vaultline_core::{Error, Result};

/// Rotation below this many bytes of entropy is refused
const MIN_GENERATED_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// JSON secrets file. When unset, secrets live in process memory only.
    pub file: Option<PathBuf>,
    /// Entropy of values generated on rotation
    pub generated_bytes: usize,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            file: None,
            generated_bytes: DEFAULT_GENERATED_BYTES,
        }
    }
}

impl SecretsConfig {
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.generated_bytes < MIN_GENERATED_BYTES {
            return Err(Error::configuration(format!(
                "secrets.generated_bytes must be at least {MIN_GENERATED_BYTES}, got {}",
                self.generated_bytes
            )));
        }
        if self
            .file
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            return Err(Error::configuration("secrets.file must not be empty"));
        }
        Ok(())
    }

    /// Build the provider this configuration describes.
    pub fn build_provider(&self) -> Result<Arc<dyn SecretsProvider>> {
        self.validate()?;
        Ok(match &self.file {
            Some(path) => Arc::new(
                FileSecretsProvider::new(path).with_generated_bytes(self.generated_bytes),
            ),
            None => Arc::new(MemorySecretsProvider::with_generated_bytes(
                self.generated_bytes,
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_memory() {
        let provider = SecretsConfig::default().build_provider().unwrap();
        assert_eq!(provider.name(), "memory");
    }

    #[test]
    fn test_file_provider_from_json() {
        let config: SecretsConfig =
            serde_json::from_str(r#"{"file": "/var/lib/vaultline/secrets.json"}"#).unwrap();
        assert_eq!(config.generated_bytes, DEFAULT_GENERATED_BYTES);
        assert_eq!(config.build_provider().unwrap().name(), "file");
    }

    #[test]
    fn test_validation() {
        let weak = SecretsConfig {
            generated_bytes: 8,
            ..SecretsConfig::default()
        };
        assert!(matches!(weak.validate(), Err(Error::Configuration { .. })));
        assert!(SecretsConfig::default().with_file("").validate().is_err());
    }
}
