//! Operator-supplied key material

use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// Length of a derived symmetric key in bytes (AES-256).
pub const DERIVED_KEY_LEN: usize = 32;

/// Opaque secret bytes supplied by the operator.
///
/// The bytes are wiped when the value is dropped. `Debug` prints a placeholder and
/// there is deliberately no `Serialize` impl, so key material cannot end up in a
/// log line or a serialized config.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial(Zeroizing<Vec<u8>>);

impl KeyMaterial {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Derive a fixed-length symmetric key with SHA-256 so any input length
    /// yields a valid AES-256 key.
    pub fn derive_key(&self) -> Zeroizing<[u8; DERIVED_KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
        let digest = Sha256::digest(self.expose());
        key.copy_from_slice(&digest);
        key
    }
}

impl From<&str> for KeyMaterial {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<String> for KeyMaterial {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

impl<'de> Deserialize<'de> for KeyMaterial {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Zeroizing::new(String::deserialize(deserializer)?);
        Ok(Self::new(value.as_bytes()))
    }
}
