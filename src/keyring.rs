//! The keyring coordinator: name validation, lifecycle, the approximate-LRU
//! signer cache, and `Close`'s zeroize-and-delete-all semantics.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::KeyringError;
use crate::keys::{Algorithm, PrivateKey};
use crate::primitives::zeroize_bytes;
use crate::signer::Signer;
use crate::store::file::FileKeyStore;
use crate::store::{EncryptedKey, KeyStore};
use crate::validation::validate_name;

/// Signing inputs above this size are rejected with [`KeyringError::DataTooLarge`]
/// before any cryptographic work happens.
pub const MAX_SIGN_INPUT_BYTES: usize = 64 * 1024 * 1024;

const DEFAULT_MAX_CACHE_SIZE: usize = 100;

struct Inner {
    cache: HashMap<String, Signer>,
    /// Oldest first. Contains exactly the same names as `cache` (I-K1).
    cache_order: VecDeque<String>,
    closed: bool,
}

impl Inner {
    fn insert(&mut self, name: String, signer: Signer, max_size: usize) {
        if self.cache.contains_key(&name) {
            self.cache_order.retain(|n| n != &name);
        } else if self.cache.len() >= max_size {
            if let Some(oldest) = self.cache_order.pop_front() {
                if let Some(mut evicted) = self.cache.remove(&oldest) {
                    evicted.zeroize();
                    debug!(name = %oldest, "evicted signer from cache");
                }
            }
        }
        self.cache_order.push_back(name.clone());
        self.cache.insert(name, signer);
    }

    fn remove(&mut self, name: &str) -> Option<Signer> {
        self.cache_order.retain(|n| n != name);
        self.cache.remove(name)
    }
}

/// Coordinates a single [`KeyStore`] backend behind a bounded, approximate
/// -LRU cache of [`Signer`] handles. All public operations are safe for
/// concurrent callers; see the module docs in `SPEC_FULL.md` for the
/// locking discipline this type follows.
pub struct Keyring {
    store: Arc<dyn KeyStore>,
    max_cache_size: usize,
    inner: RwLock<Inner>,
}

impl Keyring {
    pub fn new(store: Arc<dyn KeyStore>, max_cache_size: usize) -> Self {
        let max_cache_size = if max_cache_size == 0 {
            DEFAULT_MAX_CACHE_SIZE
        } else {
            max_cache_size
        };
        Self {
            store,
            max_cache_size,
            inner: RwLock::new(Inner {
                cache: HashMap::new(),
                cache_order: VecDeque::new(),
                closed: false,
            }),
        }
    }

    pub fn builder() -> KeyringBuilder {
        KeyringBuilder::default()
    }

    fn check_open(&self) -> Result<(), KeyringError> {
        if self.inner.read().closed {
            return Err(KeyringError::Closed);
        }
        Ok(())
    }

    /// Generates a fresh key, persists it, and caches a signer for it.
    pub fn new_key(&self, name: &str, algorithm: Algorithm) -> Result<Signer, KeyringError> {
        self.check_open()?;
        validate_name(name)?;

        let private_key = PrivateKey::generate(algorithm)?;
        let public_key = private_key.public_key()?;
        let mut encrypted = EncryptedKey::new(
            name,
            algorithm,
            public_key.to_bytes(),
            private_key.to_bytes(),
        );

        let store_result = self.store.store(name, encrypted.clone());
        zeroize_bytes(&mut encrypted.priv_key_data);
        store_result?;

        info!(name, algorithm = %algorithm, "created key");
        let signer = Signer::new(name.to_string(), private_key);
        self.inner
            .write()
            .insert(name.to_string(), signer.clone(), self.max_cache_size);
        Ok(signer)
    }

    /// Imports raw private-key bytes. Restricted to Ed25519 — see
    /// `DESIGN.md` for why the other algorithms remain reserved here.
    pub fn import_key(&self, name: &str, bytes: &[u8], algorithm: Algorithm) -> Result<Signer, KeyringError> {
        self.check_open()?;
        validate_name(name)?;
        if algorithm != Algorithm::Ed25519 {
            return Err(KeyringError::InvalidAlgorithm);
        }

        let private_key = PrivateKey::from_bytes(algorithm, bytes)?;
        let public_key = private_key.public_key()?;
        let mut encrypted = EncryptedKey::new(
            name,
            algorithm,
            public_key.to_bytes(),
            private_key.to_bytes(),
        );

        let store_result = self.store.store(name, encrypted.clone());
        zeroize_bytes(&mut encrypted.priv_key_data);
        store_result?;

        info!(name, algorithm = %algorithm, "imported key");
        let signer = Signer::new(name.to_string(), private_key);
        self.inner
            .write()
            .insert(name.to_string(), signer.clone(), self.max_cache_size);
        Ok(signer)
    }

    /// Returns a freshly allocated copy of the plaintext private-key bytes.
    /// `password` is checked against the file backend's configured
    /// password when the backend is file-based; ignored otherwise (see
    /// `DESIGN.md`).
    pub fn export_key(&self, name: &str, password: &str) -> Result<Vec<u8>, KeyringError> {
        self.check_open()?;
        validate_name(name)?;

        let mut entry = self.store.load(name)?;
        if let Some(file_store) = self.store.as_any().downcast_ref::<FileKeyStore>() {
            if !file_store.verify_password(password) {
                zeroize_bytes(&mut entry.priv_key_data);
                return Err(KeyringError::InvalidPassword);
            }
        }
        let bytes = entry.priv_key_data.clone();
        zeroize_bytes(&mut entry.priv_key_data);
        Ok(bytes)
    }

    /// Cache hit returns a clone of the cached signer without touching
    /// recency (I-K4); a miss reconstructs from the backend and inserts.
    pub fn get_key(&self, name: &str) -> Result<Signer, KeyringError> {
        self.check_open()?;
        validate_name(name)?;

        if let Some(signer) = self.inner.read().cache.get(name) {
            debug!(name, "signer cache hit");
            return Ok(signer.clone());
        }

        debug!(name, "signer cache miss");
        let mut entry = self.store.load(name)?;
        let private_key = PrivateKey::from_bytes(entry.algorithm, &entry.priv_key_data);
        zeroize_bytes(&mut entry.priv_key_data);
        let private_key = private_key.map_err(KeyringError::from)?;

        let signer = Signer::new(name.to_string(), private_key);
        self.inner
            .write()
            .insert(name.to_string(), signer.clone(), self.max_cache_size);
        Ok(signer)
    }

    pub fn list_keys(&self) -> Result<Vec<String>, KeyringError> {
        self.check_open()?;
        Ok(self.store.list()?)
    }

    /// Removes from the cache (zeroizing the cached signer) before
    /// deleting from the backend, so no subsequent cache hit can return a
    /// stale key regardless of whether the backend delete succeeds.
    pub fn delete_key(&self, name: &str) -> Result<(), KeyringError> {
        self.check_open()?;
        validate_name(name)?;

        if let Some(mut signer) = self.inner.write().remove(name) {
            signer.zeroize();
        }
        self.store.delete(name)?;
        info!(name, "deleted key");
        Ok(())
    }

    /// Signs `data` with the named key. On a cache hit, the coordinator
    /// read lock is held for the full duration of the underlying sign call
    /// so `Close` cannot zeroize the key mid-sign. On a miss, a transient
    /// signer is materialized from the backend, used once, and zeroized —
    /// it is deliberately not promoted into the cache under a lock
    /// upgrade.
    pub fn sign(&self, name: &str, data: &[u8]) -> Result<[u8; 64], KeyringError> {
        self.check_open()?;
        validate_name(name)?;
        if data.len() > MAX_SIGN_INPUT_BYTES {
            return Err(KeyringError::DataTooLarge);
        }

        let guard = self.inner.read();
        if let Some(signer) = guard.cache.get(name) {
            return signer.sign(data).map_err(KeyringError::from);
        }
        drop(guard);

        let mut entry = self.store.load(name)?;
        let private_key = PrivateKey::from_bytes(entry.algorithm, &entry.priv_key_data);
        zeroize_bytes(&mut entry.priv_key_data);
        let mut private_key = private_key.map_err(KeyringError::from)?;
        let result = private_key.sign(data).map_err(KeyringError::from);
        private_key.zeroize();
        result
    }

    /// Idempotent. Zeroizes every cached signer, then enumerates and
    /// zeroizes-and-deletes every backend entry, then closes the backend.
    /// Errors from individual deletions are aggregated into one composite
    /// error; the keyring is marked closed regardless.
    pub fn close(&self) -> Result<(), KeyringError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Ok(());
        }
        for (_, mut signer) in inner.cache.drain() {
            signer.zeroize();
        }
        inner.cache_order.clear();
        inner.closed = true;
        drop(inner);

        let mut errors = Vec::new();
        match self.store.list() {
            Ok(names) => {
                for name in names {
                    if let Ok(mut entry) = self.store.load(&name) {
                        zeroize_bytes(&mut entry.priv_key_data);
                    }
                    if let Err(e) = self.store.delete(&name) {
                        warn!(name, error = %e, "failed to delete key during close");
                        errors.push(format!("{name}: {e}"));
                    }
                }
            }
            Err(e) => errors.push(format!("list: {e}")),
        }
        if let Err(e) = self.store.close() {
            errors.push(format!("backend close: {e}"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(KeyringError::Other(errors.join("; ")))
        }
    }
}

/// Builder for [`Keyring`], mirroring the construction-time configuration
/// surface `SPEC_FULL.md` carves out of the excluded CLI/config-loader
/// concern.
#[derive(Default)]
pub struct KeyringBuilder {
    max_cache_size: Option<usize>,
}

impl KeyringBuilder {
    pub fn max_cache_size(mut self, size: usize) -> Self {
        self.max_cache_size = Some(size);
        self
    }

    pub fn build(self, store: Arc<dyn KeyStore>) -> Keyring {
        Keyring::new(store, self.max_cache_size.unwrap_or(DEFAULT_MAX_CACHE_SIZE))
    }
}
