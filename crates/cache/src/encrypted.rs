//! The encrypted key/value store

use crate::cipher::{CacheCipher, Sealed};
use crate::config::{CacheConfig, MAX_TTL};
use crate::stats::{CacheStats, CacheStatsSnapshot};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use vaultline_core::{Error, Result};
use vaultline_utils::PeriodicTask;
use zeroize::Zeroizing;

struct CacheEntry {
    sealed: Sealed,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// `now + ttl`, capped at [`MAX_TTL`] and at what the platform clock can
/// represent
fn expiry(now: Instant, ttl: Duration) -> Instant {
    let mut ttl = ttl.min(MAX_TTL);
    loop {
        if let Some(at) = now.checked_add(ttl) {
            return at;
        }
        ttl /= 2;
    }
}

enum Lookup {
    Absent,
    Expired,
    Live(Result<Zeroizing<Vec<u8>>>),
}

struct CacheInner {
    ttl: Duration,
    cipher: RwLock<CacheCipher>,
    entries: RwLock<HashMap<String, CacheEntry>>,
    stats: CacheStats,
}

/// Encrypted in-memory key/value store with per-entry TTL.
///
/// Cloning is cheap and every clone shares the same entries. The background
/// sweep stops when [`EncryptedCache::shutdown`] is called or the last clone
/// is dropped.
#[derive(Clone)]
pub struct EncryptedCache {
    inner: Arc<CacheInner>,
    sweeper: Option<Arc<PeriodicTask<usize>>>,
}

impl EncryptedCache {
    /// Build a cache from `config`. Fails fast on a missing or empty key.
    ///
    /// Starts the background sweep when enabled, which requires a tokio
    /// runtime.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let key = config
            .encryption_key
            .as_ref()
            .ok_or_else(|| Error::configuration("cache encryption key is missing"))?;

        let inner = Arc::new(CacheInner {
            ttl: config.ttl,
            cipher: RwLock::new(CacheCipher::new(key)?),
            entries: RwLock::new(HashMap::new()),
            stats: CacheStats::default(),
        });

        let sweeper = config.effective_sweep_interval().map(|interval| {
            let tick_inner = Arc::clone(&inner);
            let drain_inner = Arc::clone(&inner);
            Arc::new(PeriodicTask::spawn(
                "cache-sweep",
                interval,
                move || {
                    tick_inner.sweep_expired();
                    std::future::ready(())
                },
                move || std::future::ready(drain_inner.sweep_expired()),
            ))
        });

        Ok(Self { inner, sweeper })
    }

    /// Store `value` under `key` for the configured TTL.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Result<()> {
        self.set_with_ttl(key, value, self.inner.ttl)
    }

    /// Store `value` under `key` for `ttl`, capped at [`MAX_TTL`]. The
    /// plaintext copy is zeroed once sealed.
    pub fn set_with_ttl(
        &self,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        ttl: Duration,
    ) -> Result<()> {
        let key = key.into();
        let plaintext = Zeroizing::new(value.into());
        let sealed = self.inner.cipher.read().seal(&key, &plaintext)?;
        drop(plaintext);

        let entry = CacheEntry {
            sealed,
            expires_at: expiry(Instant::now(), ttl),
        };

        let mut entries = self.inner.entries.write();
        // A concurrent clear() may have wiped the key after we sealed.
        if self.inner.cipher.read().is_wiped() {
            return Err(Error::CacheClosed);
        }
        entries.insert(key, entry);
        drop(entries);

        self.inner.stats.record_write();
        Ok(())
    }

    /// Look up and decrypt `key`.
    ///
    /// `Ok(None)` when the key is absent or expired (an expired entry is evicted
    /// here). A ciphertext that fails authentication is [`Error::Decryption`].
    pub fn get(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let now = Instant::now();
        let lookup = {
            let entries = self.inner.entries.read();
            match entries.get(key) {
                None => Lookup::Absent,
                Some(entry) if entry.is_expired(now) => Lookup::Expired,
                Some(entry) => Lookup::Live(self.inner.cipher.read().open(key, &entry.sealed)),
            }
        };

        match lookup {
            Lookup::Live(Ok(plaintext)) => {
                self.inner.stats.record_hit();
                Ok(Some(plaintext))
            }
            Lookup::Live(Err(e)) => {
                if matches!(e, Error::Decryption { .. }) {
                    self.inner.stats.record_decryption_failure();
                    tracing::error!(key, "cached value failed authentication");
                }
                Err(e)
            }
            Lookup::Absent => {
                self.ensure_open()?;
                self.inner.stats.record_miss();
                Ok(None)
            }
            Lookup::Expired => {
                let mut entries = self.inner.entries.write();
                // A concurrent set may have refreshed the entry.
                if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
                    entries.remove(key);
                    drop(entries);
                    self.inner.stats.record_expired(1);
                    tracing::trace!(key, "evicted expired cache entry on read");
                }
                self.inner.stats.record_miss();
                Ok(None)
            }
        }
    }

    /// Serialize `value` as JSON and store it.
    pub fn set_json<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        let bytes = Zeroizing::new(serde_json::to_vec(value)?);
        self.set(key, bytes.as_slice())
    }

    /// Fetch and deserialize a value stored with [`Self::set_json`].
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove `key`. Returns whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.inner.entries.write().remove(key).is_some();
        if removed {
            self.inner.stats.record_deletion(1);
        }
        removed
    }

    /// Drop every entry and zero the key material. The cache is closed
    /// afterwards: `set` and `get` return [`Error::CacheClosed`].
    pub fn clear(&self) {
        let mut entries = self.inner.entries.write();
        let removed = entries.len();
        entries.clear();
        self.inner.cipher.write().wipe();
        drop(entries);

        self.inner.stats.record_deletion(removed as u64);
        tracing::debug!(removed, "encrypted cache cleared and key wiped");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cipher.read().is_wiped()
    }

    /// Whether an unexpired entry exists, without decrypting it
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.inner
            .entries
            .read()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Entries currently held, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Remove every expired entry now. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot(self.len())
    }

    /// Stop the background sweep after one final pass.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(sweeper) = &self.sweeper {
            sweeper
                .stop()
                .await
                .map_err(|e| Error::configuration(format!("cache sweep task failed: {e}")))?;
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::CacheClosed)
        } else {
            Ok(())
        }
    }
}

impl CacheInner {
    fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        drop(entries);

        if removed > 0 {
            self.stats.record_expired(removed as u64);
            tracing::debug!(removed, "swept expired cache entries");
        }
        removed
    }
}

impl std::fmt::Debug for EncryptedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedCache")
            .field("ttl", &self.inner.ttl)
            .field("entries", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_core::KeyMaterial;

    fn cache(key: &str) -> EncryptedCache {
        EncryptedCache::new(
            CacheConfig::new(key)
                .with_ttl(Duration::from_secs(60))
                .with_sweep_interval(Duration::ZERO),
        )
        .unwrap()
    }

    fn stored_ciphertext(cache: &EncryptedCache, key: &str) -> Vec<u8> {
        cache.inner.entries.read()[key].sealed.ciphertext.clone()
    }

    #[test]
    fn test_set_then_get() {
        let cache = cache("operator-key");
        cache.set("api-key", "sk_live_123").unwrap();
        assert_eq!(&*cache.get("api-key").unwrap().unwrap(), b"sk_live_123");
        assert_eq!(cache.get("missing").unwrap(), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_huge_ttl_is_capped() {
        let cache = cache("operator-key");
        cache
            .set_with_ttl("never-expire", "v", Duration::MAX)
            .unwrap();
        assert_eq!(&*cache.get("never-expire").unwrap().unwrap(), b"v");

        let now = Instant::now();
        let expires_at = cache.inner.entries.read()["never-expire"].expires_at;
        assert!(expires_at <= now + MAX_TTL);
        assert!(expires_at > now + Duration::from_secs(365 * 24 * 60 * 60));
    }

    #[test]
    fn test_values_are_not_stored_in_plaintext() {
        let cache = cache("operator-key");
        cache.set("api-key", "sk_live_123").unwrap();
        let stored = stored_ciphertext(&cache, "api-key");
        assert!(!stored
            .windows(b"sk_live_123".len())
            .any(|w| w == b"sk_live_123"));
    }

    #[test]
    fn test_every_bit_flip_is_detected() {
        let cache = cache("operator-key");
        cache.set("signing-key", "-----BEGIN KEY-----").unwrap();
        let original = stored_ciphertext(&cache, "signing-key");

        for byte in 0..original.len() {
            for bit in 0..8 {
                {
                    let mut entries = cache.inner.entries.write();
                    let entry = entries.get_mut("signing-key").unwrap();
                    entry.sealed.ciphertext = original.clone();
                    entry.sealed.ciphertext[byte] ^= 1 << bit;
                }
                let err = cache.get("signing-key").unwrap_err();
                assert!(matches!(err, Error::Decryption { .. }));
            }
        }
        assert_eq!(
            cache.stats().decryption_failures,
            (original.len() * 8) as u64
        );
    }

    #[test]
    fn test_tampered_nonce_is_detected() {
        let cache = cache("operator-key");
        cache.set("k", "v").unwrap();
        cache.inner.entries.write().get_mut("k").unwrap().sealed.nonce[0] ^= 0x80;
        assert!(cache.get("k").unwrap_err().is_integrity_failure());
    }

    #[test]
    fn test_different_keys_cannot_read_each_other() {
        let a = cache("key-a");
        let b = cache("key-b");
        a.set("shared-name", "secret-of-a").unwrap();

        let moved = {
            let entries = a.inner.entries.read();
            let entry = &entries["shared-name"];
            CacheEntry {
                sealed: entry.sealed.clone(),
                expires_at: entry.expires_at,
            }
        };
        b.inner
            .entries
            .write()
            .insert("shared-name".to_string(), moved);

        assert!(matches!(
            b.get("shared-name"),
            Err(Error::Decryption { .. })
        ));
        assert_eq!(&*a.get("shared-name").unwrap().unwrap(), b"secret-of-a");
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = cache("operator-key");
        cache.set("a", "1").unwrap();
        cache.set("b", "2").unwrap();

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.get("a").unwrap(), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.is_closed());
        assert!(matches!(cache.get("b"), Err(Error::CacheClosed)));
        assert!(matches!(cache.set("c", "3"), Err(Error::CacheClosed)));
        assert_eq!(cache.stats().deletions, 2);
    }

    #[test]
    fn test_json_helpers() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Credentials {
            username: String,
            password: String,
        }

        let cache = cache("operator-key");
        let creds = Credentials {
            username: "svc".to_string(),
            password: "p@ss".to_string(),
        };
        cache.set_json("db", &creds).unwrap();
        assert_eq!(cache.get_json::<Credentials>("db").unwrap(), Some(creds));
        assert_eq!(cache.get_json::<Credentials>("nope").unwrap(), None);
    }

    #[test]
    fn test_missing_key_fails_fast() {
        let err = EncryptedCache::new(CacheConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        let err = EncryptedCache::new(CacheConfig {
            encryption_key: Some(KeyMaterial::new(Vec::new())),
            ..CacheConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_reads_as_miss_and_is_evicted() {
        let cache = cache("operator-key");
        cache
            .set_with_ttl("short", "v", Duration::from_millis(50))
            .unwrap();
        cache.set("long", "v").unwrap();
        assert!(cache.contains_key("short"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!cache.contains_key("short"));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.get("short").unwrap(), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expirations, 1);
        assert!(cache.get("long").unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_removes_unread_entries() {
        let cache = EncryptedCache::new(
            CacheConfig::new("operator-key").with_ttl(Duration::from_secs(10)),
        )
        .unwrap();
        for n in 0..20 {
            cache.set(format!("write-once-{n}"), "v").unwrap();
        }
        cache
            .set_with_ttl("survivor", "v", Duration::from_secs(3600))
            .unwrap();

        // Sweep runs every ttl / 2.
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expirations, 20);

        cache.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_runs_final_sweep() {
        let cache = EncryptedCache::new(
            CacheConfig::new("operator-key")
                .with_ttl(Duration::from_secs(10))
                .with_sweep_interval(Duration::from_secs(3600)),
        )
        .unwrap();
        cache.set("a", "v").unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(cache.len(), 1);

        cache.shutdown().await.unwrap();
        assert_eq!(cache.len(), 0);
    }
}
