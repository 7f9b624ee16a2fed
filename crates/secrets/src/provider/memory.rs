use super::{generate_secret_value, SecretsProvider, DEFAULT_GENERATED_BYTES};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use vaultline_core::{Error, Result};
use zeroize::Zeroizing;

/// Process-local provider, for tests and single-node deployments
pub struct MemorySecretsProvider {
    secrets: RwLock<HashMap<String, Zeroizing<String>>>,
    generated_bytes: usize,
}

impl MemorySecretsProvider {
    pub fn new() -> Self {
        Self::with_generated_bytes(DEFAULT_GENERATED_BYTES)
    }

    pub fn with_generated_bytes(generated_bytes: usize) -> Self {
        Self {
            secrets: RwLock::new(HashMap::new()),
            generated_bytes,
        }
    }

    /// Seed the provider with initial values.
    pub fn with_secrets<I, K, V>(self, secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.secrets.write().extend(
            secrets
                .into_iter()
                .map(|(k, v)| (k.into(), Zeroizing::new(v.into()))),
        );
        self
    }

    pub fn len(&self) -> usize {
        self.secrets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySecretsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemorySecretsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySecretsProvider")
            .field("secrets", &self.len())
            .finish()
    }
}

#[async_trait]
impl SecretsProvider for MemorySecretsProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_secret(&self, name: &str) -> Result<String> {
        self.secrets
            .read()
            .get(name)
            .map(|v| v.as_str().to_owned())
            .ok_or_else(|| Error::SecretNotFound {
                name: name.to_string(),
            })
    }

    async fn put_secret(&self, name: &str, value: &str) -> Result<()> {
        self.secrets
            .write()
            .insert(name.to_string(), Zeroizing::new(value.to_string()));
        Ok(())
    }

    async fn rotate_secret(&self, name: &str) -> Result<String> {
        let fresh = generate_secret_value(self.name(), name, self.generated_bytes)?;
        let mut secrets = self.secrets.write();
        match secrets.get_mut(name) {
            Some(current) => {
                *current = Zeroizing::new(fresh.clone());
                Ok(fresh)
            }
            None => Err(Error::SecretNotFound {
                name: name.to_string(),
            }),
        }
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        self.secrets.write().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let provider = MemorySecretsProvider::new();
        provider.put_secret("api", "v1").await.unwrap();
        assert_eq!(provider.get_secret("api").await.unwrap(), "v1");

        provider.delete_secret("api").await.unwrap();
        provider.delete_secret("api").await.unwrap();
        assert!(matches!(
            provider.get_secret("api").await,
            Err(Error::SecretNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rotate_replaces_value() {
        let provider = MemorySecretsProvider::with_generated_bytes(16).with_secrets([("api", "v1")]);
        let rotated = provider.rotate_secret("api").await.unwrap();
        assert_ne!(rotated, "v1");
        assert_eq!(rotated.len(), 32);
        assert_eq!(provider.get_secret("api").await.unwrap(), rotated);
    }

    #[tokio::test]
    async fn test_rotate_unknown_secret() {
        let provider = MemorySecretsProvider::new();
        let err = provider.rotate_secret("ghost").await.unwrap_err();
        assert!(matches!(err, Error::SecretNotFound { name } if name == "ghost"));
        assert!(provider.is_empty());
    }
}
