//! Error taxonomy shared by every layer of the crate.
//!
//! Each layer gets its own `thiserror` enum, mirroring the teacher's
//! per-concern error types (`KeyStoreError`, `SignatureError`, `KdfError`)
//! rather than one flat enum for the whole crate: [`KeyError`] for
//! algorithm/key-material failures, [`StoreError`] for backend failures, and
//! [`KeyringError`] for the coordinator, which wraps both of the above via
//! `From` so a single `?` carries a failure from any layer up to the
//! caller-facing type. Each variant is a distinct, matchable kind rather
//! than an opaque string so callers can branch on outcome (`Exists` vs
//! `NotFound` vs `Closed`, etc.) the way the contracts in the module docs
//! describe.

use thiserror::Error;

/// Crate-wide result alias, keyed to the coordinator-level error.
pub type Result<T> = std::result::Result<T, KeyringError>;

/// Failures constructing, parsing, or operating on a key or signature.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("unrecognized or unsupported algorithm")]
    InvalidAlgorithm,

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("{0}")]
    Other(String),
}

/// Failures from a [`crate::store::KeyStore`] backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid key name: {0}")]
    InvalidKeyName(String),

    #[error("stored record name does not match the lookup name")]
    KeyNameMismatch,

    #[error("invalid encryption parameters: {0}")]
    InvalidEncryptionParams(String),

    #[error("invalid password or corrupted ciphertext")]
    InvalidPassword,

    #[error("key not found")]
    NotFound,

    #[error("key already exists")]
    Exists,

    #[error("operation attempted after close")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OS keychain unavailable: {0}")]
    KeychainUnavailable(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// True for the subset of errors that represent an expected, recoverable
    /// outcome rather than a defect (used by callers deciding whether to log
    /// at `warn` or `error`).
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound | StoreError::Exists | StoreError::Closed | StoreError::InvalidPassword
        )
    }
}

/// Failures from the [`crate::keyring::Keyring`] coordinator.
#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("operation attempted after close")]
    Closed,

    #[error("unrecognized or unsupported algorithm")]
    InvalidAlgorithm,

    #[error("invalid password or corrupted ciphertext")]
    InvalidPassword,

    #[error("signing input exceeds the maximum allowed size")]
    DataTooLarge,

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Other(String),
}

impl KeyringError {
    /// True for the subset of errors that represent an expected, recoverable
    /// outcome rather than a defect (used by callers deciding whether to log
    /// at `warn` or `error`).
    pub fn is_expected(&self) -> bool {
        match self {
            KeyringError::Closed | KeyringError::InvalidPassword => true,
            KeyringError::Store(e) => e.is_expected(),
            _ => false,
        }
    }
}
