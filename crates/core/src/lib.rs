//! Core domain types and errors shared by every `vaultline` crate.
//!
//! ## Key Components
//!
//! - **`errors`**: the `Error` enum and `Result` alias. Every failure mode of the
//!   audit buffer, the encrypted cache and the secret front is one variant here,
//!   grouped by how a caller is expected to react (retry, alert, fix config).
//! - **`key`**: `KeyMaterial`, the operator-supplied secret the cache derives its
//!   encryption key from. Zeroized on drop and never printed.
//! - **`ids`**: identifier generation with a documented degraded fallback.
//! - **`duration`**: serde helpers so configuration files carry milliseconds.

pub mod duration;
pub mod errors;
pub mod ids;
pub mod key;

pub use self::{
    errors::{Error, Result},
    ids::{generate_id, IdSource},
    key::KeyMaterial,
};
