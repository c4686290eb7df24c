//! Encrypted file `KeyStore`: one JSON envelope per key at
//! `<dir>/<name>.key`, password-derived ChaCha20-Poly1305 encryption of the
//! private-key bytes, name-bound AAD for rename resistance.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use parking_lot::RwLock;
use rand::RngCore;
use scrypt::Params as ScryptParams;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::keys::Algorithm;
use crate::store::{EncryptedKey, KeyStore};
use crate::validation::validate_name;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// scrypt cost parameters pinned per the spec: `N=32768, r=8, p=1`. Not
/// persisted in the envelope — see `SPEC_FULL.md` / `DESIGN.md` for the
/// open question this leaves about future parameter rotation.
fn scrypt_params() -> ScryptParams {
    ScryptParams::new(15, 8, 1, KEY_LEN).expect("fixed scrypt parameters are valid")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEnvelope {
    name: String,
    algorithm: String,
    pub_key: String,
    priv_key_data: String,
    salt: String,
    nonce: String,
}

struct State {
    closed: bool,
}

/// Password-protected, directory-backed `KeyStore`. The password is
/// supplied once at construction (via [`crate::keyring::KeyringBuilder`])
/// and held only long enough to derive a fresh per-key symmetric key on
/// each `store`/`load` call.
pub struct FileKeyStore {
    dir: PathBuf,
    password: Vec<u8>,
    state: RwLock<State>,
}

impl FileKeyStore {
    pub fn new(dir: impl AsRef<Path>, password: &str) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            password: password.as_bytes().to_vec(),
            state: RwLock::new(State { closed: false }),
        })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.key"))
    }

    /// Constant-time check of `password` against the password this store
    /// was constructed with. Used by `Keyring::export_key` to reject a
    /// caller-supplied password that doesn't match, even though per-key
    /// decryption already succeeded with the store's own password.
    pub fn verify_password(&self, password: &str) -> bool {
        crate::primitives::constant_time_eq(password.as_bytes(), &self.password)
    }

    fn derive_key(&self, salt: &[u8]) -> Result<[u8; KEY_LEN], StoreError> {
        let mut out = [0u8; KEY_LEN];
        scrypt::scrypt(&self.password, salt, &scrypt_params(), &mut out)
            .map_err(|e| StoreError::Other(format!("scrypt failed: {e}")))?;
        Ok(out)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let tmp_path = path.with_extension("key.tmp");
        fs::write(&tmp_path, contents)?;
        set_owner_only(&tmp_path)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

impl KeyStore for FileKeyStore {
    fn store(&self, name: &str, mut key: EncryptedKey) -> Result<(), StoreError> {
        validate_name(name)?;
        if key.name != name {
            return Err(StoreError::KeyNameMismatch);
        }
        let state = self.state.write();
        if state.closed {
            return Err(StoreError::Closed);
        }
        let path = self.path_for(name);
        if path.exists() {
            return Err(StoreError::Exists);
        }

        let mut salt = vec![0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let derived = self.derive_key(&salt)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(&derived)
            .map_err(|e| StoreError::Other(format!("cipher init failed: {e}")))?;
        let ciphertext = cipher.encrypt(
            nonce,
            chacha20poly1305::aead::Payload {
                msg: &key.priv_key_data,
                aad: name.as_bytes(),
            },
        );
        crate::primitives::zeroize_bytes(&mut key.priv_key_data);
        let ciphertext = ciphertext.map_err(|_| StoreError::Other("encryption failed".into()))?;

        let envelope = FileEnvelope {
            name: key.name.clone(),
            algorithm: key.algorithm.as_str().to_string(),
            pub_key: STANDARD.encode(&key.pub_key),
            priv_key_data: STANDARD.encode(&ciphertext),
            salt: STANDARD.encode(&salt),
            nonce: STANDARD.encode(nonce_bytes),
        };
        let json = serde_json::to_vec(&envelope).map_err(|e| StoreError::Other(e.to_string()))?;
        self.write_atomic(&path, &json)?;
        Ok(())
    }

    fn load(&self, name: &str) -> Result<EncryptedKey, StoreError> {
        validate_name(name)?;
        let state = self.state.read();
        if state.closed {
            return Err(StoreError::Closed);
        }
        let path = self.path_for(name);
        let contents = match fs::read(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let envelope: FileEnvelope =
            serde_json::from_slice(&contents).map_err(|e| StoreError::Other(e.to_string()))?;

        let salt = STANDARD
            .decode(&envelope.salt)
            .map_err(|e| StoreError::InvalidEncryptionParams(e.to_string()))?;
        if salt.len() < SALT_LEN {
            return Err(StoreError::InvalidEncryptionParams(format!(
                "salt must be at least {SALT_LEN} bytes"
            )));
        }
        let nonce_bytes = STANDARD
            .decode(&envelope.nonce)
            .map_err(|e| StoreError::InvalidEncryptionParams(e.to_string()))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(StoreError::InvalidEncryptionParams(format!(
                "nonce must be exactly {NONCE_LEN} bytes"
            )));
        }
        let ciphertext = STANDARD
            .decode(&envelope.priv_key_data)
            .map_err(|e| StoreError::InvalidEncryptionParams(e.to_string()))?;
        let pub_key = STANDARD
            .decode(&envelope.pub_key)
            .map_err(|e| StoreError::InvalidEncryptionParams(e.to_string()))?;

        let derived = self.derive_key(&salt)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&derived)
            .map_err(|e| StoreError::Other(format!("cipher init failed: {e}")))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        // Authenticated with the *requested* name, not the envelope's own
        // `name` field: this is what makes a rename on disk invalidate the
        // ciphertext rather than silently reattaching it to a new identity.
        let plaintext = cipher
            .decrypt(
                nonce,
                chacha20poly1305::aead::Payload {
                    msg: &ciphertext,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|_| StoreError::InvalidPassword)?;

        let algorithm = Algorithm::parse(&envelope.algorithm)?;
        Ok(EncryptedKey {
            name: envelope.name,
            algorithm,
            pub_key,
            priv_key_data: plaintext,
            salt: Some(salt),
            nonce: Some(nonce_bytes),
        })
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        let state = self.state.write();
        if state.closed {
            return Err(StoreError::Closed);
        }
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let state = self.state.read();
        if state.closed {
            return Err(StoreError::Closed);
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("key") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        Ok(names)
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.closed = true;
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
