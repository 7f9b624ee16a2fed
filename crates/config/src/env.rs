//! Environment variable overrides
//!
//! Each variable overrides one field. Unset or empty variables leave the field
//! alone; a value that does not parse is a configuration error naming the
//! variable.

use crate::config::VaultlineConfig;
use std::str::FromStr;
use std::time::Duration;
use vaultline_core::{Error, KeyMaterial, Result};

pub const AUDIT_BUFFER_SIZE: &str = "VAULTLINE_AUDIT_BUFFER_SIZE";
pub const AUDIT_MAX_BUFFERED: &str = "VAULTLINE_AUDIT_MAX_BUFFERED";
pub const AUDIT_FLUSH_INTERVAL_MS: &str = "VAULTLINE_AUDIT_FLUSH_INTERVAL_MS";
pub const AUDIT_FLUSH_TIMEOUT_MS: &str = "VAULTLINE_AUDIT_FLUSH_TIMEOUT_MS";
pub const AUDIT_RETENTION_DAYS: &str = "VAULTLINE_AUDIT_RETENTION_DAYS";
pub const AUDIT_SESSION_TTL_MS: &str = "VAULTLINE_AUDIT_SESSION_TTL_MS";
pub const CACHE_TTL_MS: &str = "VAULTLINE_CACHE_TTL_MS";
pub const CACHE_SWEEP_INTERVAL_MS: &str = "VAULTLINE_CACHE_SWEEP_INTERVAL_MS";
pub const CACHE_KEY: &str = "VAULTLINE_CACHE_KEY";
pub const SECRETS_FILE: &str = "VAULTLINE_SECRETS_FILE";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Apply overrides from the process environment.
pub fn apply_process_env(config: &mut VaultlineConfig) -> Result<()> {
    apply_overrides(config, |name| std::env::var(name).ok())
}

/// Apply overrides read through `lookup`.
pub fn apply_overrides<F>(config: &mut VaultlineConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(value) = get(AUDIT_BUFFER_SIZE) {
        config.audit.buffer_size = parse(AUDIT_BUFFER_SIZE, &value)?;
    }
    if let Some(value) = get(AUDIT_MAX_BUFFERED) {
        config.audit.max_buffered_records = Some(parse(AUDIT_MAX_BUFFERED, &value)?);
    }
    if let Some(value) = get(AUDIT_FLUSH_INTERVAL_MS) {
        config.audit.flush_interval = parse_millis(AUDIT_FLUSH_INTERVAL_MS, &value)?;
    }
    if let Some(value) = get(AUDIT_FLUSH_TIMEOUT_MS) {
        config.audit.flush_timeout = parse_millis(AUDIT_FLUSH_TIMEOUT_MS, &value)?;
    }
    if let Some(value) = get(AUDIT_SESSION_TTL_MS) {
        config.audit.session_ttl = parse_millis(AUDIT_SESSION_TTL_MS, &value)?;
    }
    if let Some(value) = get(AUDIT_RETENTION_DAYS) {
        let days: u64 = parse(AUDIT_RETENTION_DAYS, &value)?;
        let seconds = days.checked_mul(SECONDS_PER_DAY).ok_or_else(|| {
            Error::configuration(format!("{AUDIT_RETENTION_DAYS}={days} is out of range"))
        })?;
        config.audit.retention = Duration::from_secs(seconds);
    }
    if let Some(value) = get(CACHE_TTL_MS) {
        config.cache.ttl = parse_millis(CACHE_TTL_MS, &value)?;
    }
    if let Some(value) = get(CACHE_SWEEP_INTERVAL_MS) {
        config.cache.sweep_interval = Some(parse_millis(CACHE_SWEEP_INTERVAL_MS, &value)?);
    }
    if let Some(value) = lookup(CACHE_KEY).filter(|value| !value.is_empty()) {
        config.cache.encryption_key = Some(KeyMaterial::from(value));
    }
    if let Some(value) = get(SECRETS_FILE) {
        config.secrets.file = Some(value.into());
    }
    Ok(())
}

fn parse<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::configuration(format!("invalid {name}={value:?}: {e}")))
}

fn parse_millis(name: &str, value: &str) -> Result<Duration> {
    parse::<u64>(name, value).map(Duration::from_millis)
}
