//! Test doubles for code that depends on [`SecretsProvider`]

use crate::provider::{MemorySecretsProvider, SecretsProvider};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use vaultline_core::{Error, Result};

/// Memory-backed provider that counts reads and can be told to fail, stall,
/// or pause a read until released.
#[derive(Debug, Default)]
pub struct InstrumentedProvider {
    inner: MemorySecretsProvider,
    reads: AtomicUsize,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    hold_next_read: AtomicBool,
    read_started: Notify,
    release: Notify,
}

impl InstrumentedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secrets<I, K, V>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.inner = self.inner.with_secrets(secrets);
        self
    }

    /// Provider reads so far, including failed ones
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make subsequent reads fail with a transient provider error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make subsequent reads sleep before completing
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// The next read captures its value, then waits for [`Self::release`].
    pub fn hold_next_read(&self) {
        self.hold_next_read.store(true, Ordering::SeqCst);
    }

    /// Resolves once a held read has captured its value.
    pub async fn read_started(&self) {
        self.read_started.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl SecretsProvider for InstrumentedProvider {
    fn name(&self) -> &str {
        "instrumented"
    }

    async fn get_secret(&self, name: &str) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::provider(name, "get", "provider unavailable"));
        }

        let value = self.inner.get_secret(name).await;
        if self.hold_next_read.swap(false, Ordering::SeqCst) {
            self.read_started.notify_one();
            self.release.notified().await;
        }
        value
    }

    async fn put_secret(&self, name: &str, value: &str) -> Result<()> {
        self.inner.put_secret(name, value).await
    }

    async fn rotate_secret(&self, name: &str) -> Result<String> {
        self.inner.rotate_secret(name).await
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        self.inner.delete_secret(name).await
    }
}
