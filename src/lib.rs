//! Multi-algorithm signing keyring.
//!
//! Generates, imports, stores, retrieves, and uses asymmetric signing keys
//! across three algorithms (Ed25519, secp256k1, secp256r1), behind a
//! uniform [`signer::Signer`] surface and a pluggable [`store::KeyStore`]
//! backend. See [`keyring::Keyring`] for the entry point most callers want.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod envelope;
pub mod error;
pub mod keyring;
pub mod keys;
pub mod primitives;
pub mod signature_utils;
pub mod signer;
pub mod store;
pub mod validation;

pub use crate::error::{KeyError, KeyringError, Result, StoreError};
pub use crate::keyring::{Keyring, KeyringBuilder};
pub use crate::keys::{Algorithm, PrivateKey, PublicKey};
pub use crate::signer::Signer;
pub use crate::store::{EncryptedKey, KeyStore};

/// Crate version, read from `Cargo.toml` at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
