//! Running service context

use crate::config::VaultlineConfig;
use std::sync::Arc;
use vaultline_audit::{AuditBuffer, AuditStorage};
use vaultline_core::Result;
use vaultline_secrets::{SecretCache, SecretsProvider};

/// The audit buffer and secret cache built from one configuration.
///
/// There is no process-global instance; callers hold a `Vaultline` (or an
/// `Arc` of it) and pass it where it is needed. Starting a second context
/// gives independent components.
pub struct Vaultline {
    config: VaultlineConfig,
    audit: AuditBuffer,
    secrets: SecretCache,
}

impl Vaultline {
    /// Validate `config` and start the background flush and sweep tasks.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(
        config: VaultlineConfig,
        storage: Arc<dyn AuditStorage>,
        provider: Arc<dyn SecretsProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let provider_name = provider.name().to_string();
        let secrets = SecretCache::new(provider, config.cache.clone())?;
        let audit = AuditBuffer::new(config.audit.clone(), storage)?;

        tracing::info!(
            buffer_size = config.audit.buffer_size,
            provider = %provider_name,
            "vaultline started"
        );
        Ok(Self {
            config,
            audit,
            secrets,
        })
    }

    /// Start with the secrets provider described by `config.secrets`.
    pub fn from_config(config: VaultlineConfig, storage: Arc<dyn AuditStorage>) -> Result<Self> {
        let provider = config.secrets.build_provider()?;
        Self::start(config, storage, provider)
    }

    pub fn audit(&self) -> &AuditBuffer {
        &self.audit
    }

    pub fn secrets(&self) -> &SecretCache {
        &self.secrets
    }

    pub fn config(&self) -> &VaultlineConfig {
        &self.config
    }

    /// Flush and stop the audit buffer, then stop the cache sweep.
    ///
    /// Both components are shut down even if the first fails; the first
    /// error is returned.
    pub async fn shutdown(&self) -> Result<()> {
        let audit = self.audit.stop().await;
        if let Err(e) = &audit {
            tracing::error!(error = %e, "final audit flush failed during shutdown");
        }
        let secrets = self.secrets.shutdown().await;

        audit?;
        secrets?;
        tracing::info!("vaultline stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Vaultline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vaultline")
            .field("audit", &self.audit.metrics())
            .field("secrets", &self.secrets)
            .finish()
    }
}
