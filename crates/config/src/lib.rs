//! Configuration and service wiring for vaultline
//!
//! [`ConfigLoader`] layers built-in defaults, an optional JSON file and
//! `VAULTLINE_*` environment variables into a [`VaultlineConfig`].
//! [`Vaultline`] turns a validated configuration plus a storage sink and a
//! secrets provider into running components, and shuts them down in order.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vaultline_audit::MemoryAuditStorage;
//! use vaultline_config::{ConfigLoader, Vaultline};
//!
//! # async fn example() -> vaultline_core::Result<()> {
//! let config = ConfigLoader::new().file("/etc/vaultline.json").load().await?;
//! let provider = config.secrets.build_provider()?;
//! let vaultline = Vaultline::start(config, Arc::new(MemoryAuditStorage::new()), provider)?;
//!
//! // ... serve requests ...
//!
//! vaultline.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod env;
pub mod loader;

pub use config::VaultlineConfig;
pub use context::Vaultline;
pub use loader::ConfigLoader;
