//! Shared runtime utilities for vaultline
//!
//! Background maintenance (audit flushing, cache sweeping), atomic file
//! replacement and logging setup live here so every component drives them the
//! same way.

pub mod atomic_file;
pub mod periodic;
pub mod tracing;

pub use atomic_file::write_atomic;
pub use periodic::PeriodicTask;
