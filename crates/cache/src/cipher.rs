//! AEAD sealing of cache values

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use vaultline_core::key::DERIVED_KEY_LEN;
use vaultline_core::{Error, KeyMaterial, Result};
use zeroize::Zeroizing;

/// AES-GCM nonce size (96 bits)
pub const NONCE_LEN: usize = 12;

/// Sealed value plus the nonce it was sealed with
#[derive(Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
}

/// Holds the derived key. Dropping it (or calling [`CacheCipher::wipe`])
/// zeroes the key bytes.
pub struct CacheCipher {
    key: Option<Zeroizing<[u8; DERIVED_KEY_LEN]>>,
}

impl CacheCipher {
    pub fn new(material: &KeyMaterial) -> Result<Self> {
        if material.is_empty() {
            return Err(Error::configuration("cache encryption key must not be empty"));
        }
        Ok(Self {
            key: Some(material.derive_key()),
        })
    }

    pub fn is_wiped(&self) -> bool {
        self.key.is_none()
    }

    /// Zero the key. Every later seal/open fails with [`Error::CacheClosed`].
    pub fn wipe(&mut self) {
        self.key = None;
    }

    /// Seal `plaintext` with a fresh nonce. The cache key is bound as associated
    /// data so a ciphertext moved to another key fails authentication.
    pub fn seal(&self, cache_key: &str, plaintext: &[u8]) -> Result<Sealed> {
        let cipher = self.aead()?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| Error::Encryption {
                key: cache_key.to_string(),
                message: format!("nonce generation failed: {e}"),
            })?;

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: cache_key.as_bytes(),
                },
            )
            .map_err(|_| Error::Encryption {
                key: cache_key.to_string(),
                message: "AEAD seal failed".to_string(),
            })?;

        Ok(Sealed { ciphertext, nonce })
    }

    /// Open a sealed value. Authentication failure is [`Error::Decryption`].
    pub fn open(&self, cache_key: &str, sealed: &Sealed) -> Result<Zeroizing<Vec<u8>>> {
        let cipher = self.aead()?;
        cipher
            .decrypt(
                Nonce::from_slice(&sealed.nonce),
                Payload {
                    msg: &sealed.ciphertext,
                    aad: cache_key.as_bytes(),
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| Error::Decryption {
                key: cache_key.to_string(),
            })
    }

    fn aead(&self) -> Result<Aes256Gcm> {
        let key = self.key.as_ref().ok_or(Error::CacheClosed)?;
        Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|_| Error::configuration("derived cache key has invalid length"))
    }
}

impl std::fmt::Debug for CacheCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCipher")
            .field("wiped", &self.is_wiped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let cipher = CacheCipher::new(&KeyMaterial::from("operator-secret")).unwrap();
        let sealed = cipher.seal("db/password", b"hunter2").unwrap();
        assert_ne!(sealed.ciphertext, b"hunter2".to_vec());
        assert_eq!(&*cipher.open("db/password", &sealed).unwrap(), b"hunter2");
    }

    #[test]
    fn test_nonces_are_fresh() {
        let cipher = CacheCipher::new(&KeyMaterial::from("operator-secret")).unwrap();
        let a = cipher.seal("k", b"same").unwrap();
        let b = cipher.seal("k", b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_ciphertext_bound_to_cache_key() {
        let cipher = CacheCipher::new(&KeyMaterial::from("operator-secret")).unwrap();
        let sealed = cipher.seal("tenant-a/api-key", b"value").unwrap();
        let err = cipher.open("tenant-b/api-key", &sealed).unwrap_err();
        assert!(matches!(err, Error::Decryption { .. }));
    }

    #[test]
    fn test_wipe_closes_cipher() {
        let mut cipher = CacheCipher::new(&KeyMaterial::from("operator-secret")).unwrap();
        let sealed = cipher.seal("k", b"v").unwrap();
        cipher.wipe();
        assert!(cipher.is_wiped());
        assert!(matches!(cipher.open("k", &sealed), Err(Error::CacheClosed)));
        assert!(matches!(cipher.seal("k", b"v"), Err(Error::CacheClosed)));
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = CacheCipher::new(&KeyMaterial::new(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
