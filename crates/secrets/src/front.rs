//! Read-through secret cache

use crate::provider::SecretsProvider;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use vaultline_cache::{CacheConfig, CacheStatsSnapshot, EncryptedCache};
use vaultline_core::{Error, Result};
use zeroize::Zeroizing;

/// Caches provider reads in an [`EncryptedCache`].
///
/// Per secret name the front moves between *uncached*, *fetching* and
/// *cached*. A miss fetches from the provider and populates the cache; the
/// entry then lives until its TTL passes or the secret is rotated, deleted or
/// invalidated through this front.
///
/// Concurrent misses on one name share a single provider fetch. Every
/// invalidation bumps a per-name generation, and a fetch only populates the
/// cache if the generation it started under is still current, so a value
/// that was rotated away while in flight is handed to its caller but never
/// cached.
pub struct SecretCache {
    provider: Arc<dyn SecretsProvider>,
    cache: EncryptedCache,
    inflight: DashMap<String, Arc<Mutex<()>>>,
    generations: DashMap<String, u64>,
}

impl SecretCache {
    /// Build a front with its own cache. Fails on invalid cache config.
    pub fn new(provider: Arc<dyn SecretsProvider>, cache_config: CacheConfig) -> Result<Self> {
        Ok(Self::with_cache(provider, EncryptedCache::new(cache_config)?))
    }

    pub fn with_cache(provider: Arc<dyn SecretsProvider>, cache: EncryptedCache) -> Self {
        Self {
            provider,
            cache,
            inflight: DashMap::new(),
            generations: DashMap::new(),
        }
    }

    /// Return the secret, from cache when possible.
    ///
    /// A provider failure on a miss is returned as is. Nothing is cached on
    /// failure and no stale value is substituted.
    pub async fn get_secret(&self, name: &str) -> Result<Zeroizing<String>> {
        if let Some(value) = self.cached(name)? {
            return Ok(value);
        }

        let slot = self
            .inflight
            .entry(name.to_string())
            .or_default()
            .clone();
        let guard = slot.lock().await;

        // Another caller may have populated the entry while we waited.
        let result = match self.cached(name) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => self.fetch(name).await,
            Err(e) => Err(e),
        };

        drop(guard);
        drop(slot);
        self.inflight
            .remove_if(name, |_, slot| Arc::strong_count(slot) == 1);
        result
    }

    /// Write through to the provider, then the cache.
    pub async fn put_secret(&self, name: &str, value: &str) -> Result<()> {
        self.provider.put_secret(name, value).await?;

        let mut generation = self.generations.entry(name.to_string()).or_insert(0);
        *generation += 1;
        self.cache.set(name, value.as_bytes())?;
        drop(generation);

        tracing::debug!(secret = name, provider = self.provider.name(), "secret written through");
        Ok(())
    }

    /// Rotate at the provider and drop the cached value. The next read
    /// fetches the new value.
    pub async fn rotate_secret(&self, name: &str) -> Result<Zeroizing<String>> {
        let rotated = self.provider.rotate_secret(name).await;
        // Invalidate even on failure: the provider state is unknown.
        self.invalidate(name);
        let value = rotated?;
        tracing::info!(secret = name, provider = self.provider.name(), "secret rotated");
        Ok(Zeroizing::new(value))
    }

    pub async fn delete_secret(&self, name: &str) -> Result<()> {
        let deleted = self.provider.delete_secret(name).await;
        self.invalidate(name);
        deleted?;
        tracing::info!(secret = name, provider = self.provider.name(), "secret deleted");
        Ok(())
    }

    /// Drop any cached value for `name` and cancel population by in-flight
    /// fetches. Returns whether a cached entry was removed.
    pub fn invalidate(&self, name: &str) -> bool {
        let mut generation = self.generations.entry(name.to_string()).or_insert(0);
        *generation += 1;
        drop(generation);

        let removed = self.cache.delete(name);
        tracing::debug!(secret = name, removed, "secret invalidated");
        removed
    }

    pub fn provider(&self) -> &Arc<dyn SecretsProvider> {
        &self.provider
    }

    pub fn cache(&self) -> &EncryptedCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    /// Stop the cache sweep.
    pub async fn shutdown(&self) -> Result<()> {
        self.cache.shutdown().await
    }

    fn cached(&self, name: &str) -> Result<Option<Zeroizing<String>>> {
        match self.cache.get(name) {
            Ok(Some(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(value) => Ok(Some(Zeroizing::new(value.to_owned()))),
                Err(_) => {
                    // Only this front writes the cache, always from a &str
                    self.cache.delete(name);
                    Err(Error::Decryption {
                        key: name.to_string(),
                    })
                }
            },
            Ok(None) => Ok(None),
            Err(Error::Decryption { key }) => {
                // Drop the entry so the next read refetches a clean copy.
                self.cache.delete(name);
                Err(Error::Decryption { key })
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self, name: &str) -> Result<Zeroizing<String>> {
        let started_under = *self.generations.entry(name.to_string()).or_insert(0);

        let value = match self.provider.get_secret(name).await {
            Ok(value) => Zeroizing::new(value),
            Err(e) => {
                tracing::warn!(
                    secret = name,
                    provider = self.provider.name(),
                    error = %e,
                    "secret fetch failed"
                );
                return Err(e);
            }
        };

        // Hold the generation entry while populating so an invalidation
        // cannot slip in between the check and the write.
        let generation = self.generations.entry(name.to_string()).or_insert(0);
        if *generation == started_under {
            self.cache.set(name, value.as_bytes())?;
            tracing::debug!(secret = name, provider = self.provider.name(), "secret cached");
        } else {
            tracing::debug!(
                secret = name,
                "secret changed during fetch; returning value without caching"
            );
        }
        drop(generation);

        Ok(value)
    }
}

impl std::fmt::Debug for SecretCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCache")
            .field("provider", &self.provider.name())
            .field("cache", &self.cache)
            .field("inflight", &self.inflight.len())
            .finish()
    }
}
