//! The `KeyStore` backend contract and its three implementations.

pub mod caching;
pub mod file;
pub mod keychain;
pub mod memory;

use std::fmt;

use crate::error::StoreError;
use crate::keys::Algorithm;

/// Backend-facing record for one stored key.
///
/// `salt`/`nonce` are absent for the in-memory and keychain backends (they
/// have no envelope of their own) and populated by the file backend's
/// `Store`, which also validates them on `Load`.
///
/// `priv_key_data` is plaintext for the in-memory and keychain backends (the
/// OS or process is the encryption boundary there) and ciphertext for the
/// file backend; either way it's key material, so `Debug` redacts it.
#[derive(Clone)]
pub struct EncryptedKey {
    pub name: String,
    pub algorithm: Algorithm,
    pub pub_key: Vec<u8>,
    pub priv_key_data: Vec<u8>,
    pub salt: Option<Vec<u8>>,
    pub nonce: Option<Vec<u8>>,
}

impl fmt::Debug for EncryptedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedKey")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("pub_key", &hex::encode(&self.pub_key))
            .field("priv_key_data", &"[REDACTED]")
            .field("salt", &self.salt.as_ref().map(|_| "[REDACTED]"))
            .field("nonce", &self.nonce.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl EncryptedKey {
    pub fn new(name: impl Into<String>, algorithm: Algorithm, pub_key: Vec<u8>, priv_key_data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            algorithm,
            pub_key,
            priv_key_data,
            salt: None,
            nonce: None,
        }
    }
}

/// Shared contract implemented by every backend. Each backend holds exactly
/// one reader-writer lock guarding its mutable state; `load`/`list`/`has`
/// take the read lock, `store`/`delete`/`close` take the write lock.
pub trait KeyStore: Send + Sync {
    /// Atomic exclusive create: returns [`StoreError::Exists`] if `name` is
    /// already present. This atomicity is what the keyring coordinator
    /// relies on for its race-free `NewKey`.
    fn store(&self, name: &str, key: EncryptedKey) -> Result<(), StoreError>;

    fn load(&self, name: &str) -> Result<EncryptedKey, StoreError>;

    fn delete(&self, name: &str) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<String>, StoreError>;

    fn has(&self, name: &str) -> Result<bool, StoreError> {
        match self.load(name) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Idempotent; subsequent calls after the first are no-ops returning
    /// success.
    fn close(&self) -> Result<(), StoreError>;

    /// Lets the keyring coordinator downcast to a concrete backend type
    /// (used by `ExportKey` to check a caller-supplied password against the
    /// file backend's configured one).
    fn as_any(&self) -> &dyn std::any::Any;
}
