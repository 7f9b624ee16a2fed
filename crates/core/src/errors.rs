use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for vaultline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vaultline operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The durable audit sink rejected or failed a write/read
    #[error("audit storage {operation} failed: {message}")]
    Storage {
        operation: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timeout errors
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// A record's stored checksum does not match its recomputed digest
    #[error("integrity check failed for audit record '{record_id}': expected {expected}, computed {actual}")]
    Integrity {
        record_id: String,
        expected: String,
        actual: String,
    },

    /// AEAD authentication failed while opening a cached value
    #[error("failed to decrypt cached value for '{key}': ciphertext failed authentication")]
    Decryption { key: String },

    /// Sealing a value failed (nonce source or cipher failure)
    #[error("failed to encrypt value for '{key}': {message}")]
    Encryption { key: String, message: String },

    /// The cache key material was cleared; the cache no longer accepts operations
    #[error("encrypted cache is closed: key material has been cleared")]
    CacheClosed,

    /// The audit buffer is at its hard ceiling and the sink is not draining it
    #[error("audit buffer full: {buffered} records pending (ceiling {ceiling})")]
    BackPressure { buffered: usize, ceiling: usize },

    /// A background component was used after shutdown
    #[error("{component} has been stopped")]
    Stopped { component: &'static str },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The secrets provider holds no secret under this name
    #[error("secret '{name}' not found")]
    SecretNotFound { name: String },

    /// The secrets provider failed
    #[error("secrets provider {operation} failed for '{name}': {message}")]
    Provider {
        name: String,
        operation: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a storage error
    #[must_use]
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Storage {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error with a source error
    #[must_use]
    pub fn storage_with_source(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Storage {
            operation: operation.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a provider error
    #[must_use]
    pub fn provider(
        name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Provider {
            name: name.into(),
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Whether the failure may clear up on its own and is worth retrying on the
    /// next flush trigger or request.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Storage { .. }
                | Error::Timeout { .. }
                | Error::Provider { .. }
                | Error::FileSystem { .. }
                | Error::BackPressure { .. }
        )
    }

    /// Whether the failure indicates tampering or corruption. These are never
    /// retried or swallowed.
    #[must_use]
    pub const fn is_integrity_failure(&self) -> bool {
        matches!(self, Error::Integrity { .. } | Error::Decryption { .. })
    }
}
