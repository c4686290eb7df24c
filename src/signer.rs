//! A bound `(private key, sign)` handle callers obtain from the keyring.

use crate::error::KeyError;
use crate::keys::{Algorithm, PrivateKey, PublicKey};

/// Binds a private key to the signing operation. Obtained from
/// [`crate::keyring::Keyring`]; never constructed directly by callers.
///
/// `Clone` performs a deep copy of the private key material: the keyring
/// keeps one clone in its signer cache while handing callers their own.
#[derive(Clone)]
pub struct Signer {
    name: String,
    key: PrivateKey,
}

impl Signer {
    pub(crate) fn new(name: String, key: PrivateKey) -> Self {
        Self { name, key }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn algorithm(&self) -> Algorithm {
        self.key.algorithm()
    }

    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        self.key.public_key()
    }

    /// Produces a 64-byte signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; 64], KeyError> {
        self.key.sign(message)
    }

    pub(crate) fn zeroize(&mut self) {
        self.key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signer_signs_and_verifies() {
        let key = PrivateKey::generate(Algorithm::Ed25519).unwrap();
        let pk = key.public_key().unwrap();
        let signer = Signer::new("alice".into(), key);
        let sig = signer.sign(b"payload").unwrap();
        assert!(pk.verify(b"payload", &sig));
        assert_eq!(signer.name(), "alice");
    }
}
