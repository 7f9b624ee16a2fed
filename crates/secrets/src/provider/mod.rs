//! The provider abstraction and built-in providers

mod file;
mod memory;

pub use file::FileSecretsProvider;
pub use memory::MemorySecretsProvider;

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use vaultline_core::{Error, Result};

/// Bytes of entropy in a generated secret when nothing else is configured
pub const DEFAULT_GENERATED_BYTES: usize = 32;

/// Source of truth for secret values.
///
/// Implementations must be safe to call concurrently. A read of a name the
/// provider has never seen is [`Error::SecretNotFound`].
#[async_trait]
pub trait SecretsProvider: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    async fn get_secret(&self, name: &str) -> Result<String>;

    /// Create or overwrite `name`.
    async fn put_secret(&self, name: &str, value: &str) -> Result<()>;

    /// Replace the value of an existing secret with a freshly generated one
    /// and return it.
    async fn rotate_secret(&self, name: &str) -> Result<String>;

    /// Remove `name`. Deleting a name that does not exist is not an error.
    async fn delete_secret(&self, name: &str) -> Result<()>;
}

/// Hex-encoded random value with `bytes` bytes of entropy
pub(crate) fn generate_secret_value(provider: &str, name: &str, bytes: usize) -> Result<String> {
    let mut buf = zeroize::Zeroizing::new(vec![0u8; bytes]);
    OsRng.try_fill_bytes(&mut buf).map_err(|e| Error::Provider {
        name: name.to_string(),
        operation: "rotate".to_string(),
        message: format!("{provider}: random source unavailable"),
        source: Some(Box::new(e)),
    })?;
    Ok(hex::encode(&*buf))
}
