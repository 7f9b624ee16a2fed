//! Encrypted cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use vaultline_core::duration::{millis, option_millis};
use vaultline_core::{Error, KeyMaterial, Result};

/// Smallest sweep period derived from a TTL
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Longest TTL an entry can carry (about 30 years). Longer per-call TTLs are
/// capped to it.
pub const MAX_TTL: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of an entry written with `set`
    #[serde(rename = "ttl_ms", with = "millis")]
    pub ttl: Duration,
    /// Background sweep period. Defaults to half the TTL; zero disables the sweep.
    #[serde(rename = "sweep_interval_ms", with = "option_millis")]
    pub sweep_interval: Option<Duration>,
    /// Operator secret the AES key is derived from. Never serialized.
    #[serde(skip_serializing)]
    pub encryption_key: Option<KeyMaterial>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            sweep_interval: None,
            encryption_key: None,
        }
    }
}

impl CacheConfig {
    pub fn new(encryption_key: impl Into<KeyMaterial>) -> Self {
        Self {
            encryption_key: Some(encryption_key.into()),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = Some(sweep_interval);
        self
    }

    /// The sweep period in effect, `None` when sweeping is disabled
    pub fn effective_sweep_interval(&self) -> Option<Duration> {
        match self.sweep_interval {
            Some(interval) if interval.is_zero() => None,
            Some(interval) => Some(interval),
            None => Some((self.ttl / 2).max(MIN_SWEEP_INTERVAL)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(Error::configuration("cache ttl must be positive"));
        }
        if self.ttl > MAX_TTL {
            return Err(Error::configuration(format!(
                "cache ttl must not exceed {} seconds",
                MAX_TTL.as_secs()
            )));
        }
        if self.sweep_interval.is_some_and(|interval| interval > MAX_TTL) {
            return Err(Error::configuration(format!(
                "cache sweep_interval must not exceed {} seconds",
                MAX_TTL.as_secs()
            )));
        }
        match &self.encryption_key {
            None => Err(Error::configuration("cache encryption key is missing")),
            Some(key) if key.is_empty() => {
                Err(Error::configuration("cache encryption key must not be empty"))
            }
            Some(_) => Ok(()),
        }
    }
}
