//! Secret storage backends and the cache that fronts them
//!
//! A [`SecretsProvider`] is the source of truth (a vault, a cloud secret
//! manager, a file). [`SecretCache`] sits in front of one and keeps recently
//! read values in an [`vaultline_cache::EncryptedCache`], so repeated reads of
//! the same secret do not round-trip to the provider until the entry expires.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vaultline_cache::CacheConfig;
//! use vaultline_secrets::{MemorySecretsProvider, SecretCache};
//!
//! # async fn example() -> vaultline_core::Result<()> {
//! let provider = Arc::new(MemorySecretsProvider::new());
//! let secrets = SecretCache::new(provider, CacheConfig::new("operator-key"))?;
//!
//! secrets.put_secret("db/password", "hunter2").await?;
//! let password = secrets.get_secret("db/password").await?;
//! assert_eq!(password.as_str(), "hunter2");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod front;
pub mod provider;
pub mod testing;

pub use config::SecretsConfig;
pub use front::SecretCache;
pub use provider::{FileSecretsProvider, MemorySecretsProvider, SecretsProvider};
