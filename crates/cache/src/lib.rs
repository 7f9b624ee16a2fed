//! Encrypted, TTL-bounded in-memory cache
//!
//! Values are sealed with AES-256-GCM under a key derived from operator key
//! material, each with a fresh random nonce. Entries expire after a TTL; an
//! expired entry reads as a miss and is evicted on the spot, and a background
//! sweep removes expired entries that are never read again.

pub mod cipher;
pub mod config;
pub mod encrypted;
pub mod stats;

pub use config::CacheConfig;
pub use encrypted::EncryptedCache;
pub use stats::CacheStatsSnapshot;
