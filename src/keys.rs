//! Algorithm-tagged private and public key values.
//!
//! `PrivateKey` and `PublicKey` are sum types over the three supported
//! algorithms rather than a class hierarchy: each variant owns its raw key
//! material and the enum's methods dispatch on the algorithm tag. The
//! underlying curve library types (`ed25519_dalek::SigningKey`, `k256`,
//! `p256`) are constructed on demand from that material rather than held
//! long-term, so zeroization only ever has to clear one buffer per key.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ecdsa::signature::{Signer as _, Verifier as _};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::KeyError;
use crate::primitives::{constant_time_eq, rfc6979_nonce};
use crate::signature_utils;

/// The three signing algorithms this crate supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Ed25519,
    Secp256k1,
    Secp256r1,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Ed25519 => "ed25519",
            Algorithm::Secp256k1 => "secp256k1",
            Algorithm::Secp256r1 => "secp256r1",
        }
    }

    pub fn parse(s: &str) -> Result<Self, KeyError> {
        match s {
            "ed25519" => Ok(Algorithm::Ed25519),
            "secp256k1" => Ok(Algorithm::Secp256k1),
            "secp256r1" | "p256" | "P-256" => Ok(Algorithm::Secp256r1),
            _ => Err(KeyError::InvalidAlgorithm),
        }
    }

    /// Canonical private-key byte length (64 for Ed25519's expanded form,
    /// 32 for both ECDSA variants).
    pub fn private_key_len(self) -> usize {
        match self {
            Algorithm::Ed25519 => 64,
            Algorithm::Secp256k1 | Algorithm::Secp256r1 => 32,
        }
    }

    /// Canonical public-key byte length (32 for Ed25519, 33 for a
    /// compressed secp point).
    pub fn public_key_len(self) -> usize {
        match self {
            Algorithm::Ed25519 => 32,
            Algorithm::Secp256k1 | Algorithm::Secp256r1 => 33,
        }
    }

    /// All signature payloads in this crate are a fixed 64 bytes: `r ‖ s`
    /// for ECDSA, the standard expanded form for Ed25519.
    pub const SIGNATURE_LEN: usize = 64;
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned, zeroize-on-drop private key material. Holds exactly
/// `algorithm.private_key_len()` bytes; never `Copy`, and `Clone` performs a
/// deep copy (needed by the in-memory backend's deep-copy-on-Store
/// contract).
#[derive(Clone, ZeroizeOnDrop)]
struct SecretBytes(Vec<u8>);

impl SecretBytes {
    fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// An algorithm-tagged private signing key.
#[derive(Clone)]
pub struct PrivateKey {
    algorithm: Algorithm,
    material: SecretBytes,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm)
            .field("material", &self.material)
            .finish()
    }
}

impl PrivateKey {
    /// Generates a fresh random key for `algorithm`.
    pub fn generate(algorithm: Algorithm) -> Result<Self, KeyError> {
        let mut rng = rand::rngs::OsRng;
        let material = match algorithm {
            Algorithm::Ed25519 => {
                let signing_key = ed25519_dalek::SigningKey::generate(&mut rng);
                signing_key.to_keypair_bytes().to_vec()
            }
            Algorithm::Secp256k1 => {
                let signing_key = k256::ecdsa::SigningKey::random(&mut rng);
                signing_key.to_bytes().to_vec()
            }
            Algorithm::Secp256r1 => {
                let signing_key = p256::ecdsa::SigningKey::random(&mut rng);
                signing_key.to_bytes().to_vec()
            }
        };
        Ok(Self {
            algorithm,
            material: SecretBytes::new(material),
        })
    }

    /// Reconstructs a key from its canonical byte encoding, validating
    /// length and, for the ECDSA variants, scalar range.
    pub fn from_bytes(algorithm: Algorithm, bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != algorithm.private_key_len() {
            return Err(KeyError::InvalidKey(format!(
                "{algorithm} private key must be {} bytes, got {}",
                algorithm.private_key_len(),
                bytes.len()
            )));
        }
        match algorithm {
            Algorithm::Ed25519 => {
                let seed: [u8; 32] = bytes[..32]
                    .try_into()
                    .map_err(|_| KeyError::InvalidKey("bad ed25519 seed length".into()))?;
                // Validate by constructing; catches malformed expanded forms early.
                let _ = ed25519_dalek::SigningKey::from_bytes(&seed);
            }
            Algorithm::Secp256k1 => {
                k256::ecdsa::SigningKey::from_slice(bytes)
                    .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
            }
            Algorithm::Secp256r1 => {
                p256::ecdsa::SigningKey::from_slice(bytes)
                    .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
            }
        }
        Ok(Self {
            algorithm,
            material: SecretBytes::new(bytes.to_vec()),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Canonical byte encoding (the 64-byte expanded form for Ed25519, the
    /// 32-byte scalar for the ECDSA variants).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.material.as_slice().to_vec()
    }

    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        match self.algorithm {
            Algorithm::Ed25519 => {
                let seed: [u8; 32] = self.material.as_slice()[..32].try_into().unwrap();
                let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
                Ok(PublicKey::Ed25519(signing_key.verifying_key()))
            }
            Algorithm::Secp256k1 => {
                let signing_key = k256::ecdsa::SigningKey::from_slice(self.material.as_slice())
                    .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
                Ok(PublicKey::Secp256k1(*signing_key.verifying_key()))
            }
            Algorithm::Secp256r1 => {
                let signing_key = p256::ecdsa::SigningKey::from_slice(self.material.as_slice())
                    .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
                Ok(PublicKey::Secp256r1(*signing_key.verifying_key()))
            }
        }
    }

    /// Produces a canonical, 64-byte, low-S (for the ECDSA variants)
    /// signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; 64], KeyError> {
        match self.algorithm {
            Algorithm::Ed25519 => {
                let seed: [u8; 32] = self.material.as_slice()[..32].try_into().unwrap();
                let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
                let sig: ed25519_dalek::Signature = signing_key.sign(message);
                Ok(sig.to_bytes())
            }
            Algorithm::Secp256k1 => {
                // k256's SigningKey is RFC 6979-deterministic and always
                // emits a low-S signature; no post-processing required.
                let signing_key = k256::ecdsa::SigningKey::from_slice(self.material.as_slice())
                    .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
                let sig: k256::ecdsa::Signature = signing_key.sign(message);
                let mut out = [0u8; 64];
                out.copy_from_slice(&sig.to_bytes());
                Ok(out)
            }
            Algorithm::Secp256r1 => self.sign_p256(message),
        }
    }

    /// Signs with explicit RFC 6979 nonce derivation (p256's default signer
    /// is deterministic but does not normalize to low-S), followed by a
    /// manual low-S normalization pass.
    fn sign_p256(&self, message: &[u8]) -> Result<[u8; 64], KeyError> {
        use p256::NonZeroScalar;
        use sha2::{Digest, Sha256};

        let n = signature_utils::curve_order(Algorithm::Secp256r1)
            .expect("curve_order is defined for Secp256r1");
        let d_bytes = self.material.as_slice();
        let h1 = Sha256::digest(message);

        let k_bytes = rfc6979_nonce(d_bytes, &h1, &n);

        let d_scalar = NonZeroScalar::try_from(d_bytes)
            .map_err(|_| KeyError::InvalidKey("secp256r1 scalar out of range".into()))?;
        let k_scalar = NonZeroScalar::try_from(k_bytes.as_slice())
            .map_err(|_| KeyError::Other("RFC 6979 nonce out of range".into()))?;

        let z = ecdsa::hazmat::bits2field::<p256::NistP256>(&h1)
            .map_err(|_| KeyError::Other("failed to reduce prehash".into()))?;

        let (sig, _recid) =
            ecdsa::hazmat::sign_prehashed::<p256::NistP256>(&d_scalar, &k_scalar, &z)
                .map_err(|e| KeyError::Other(format!("p256 signing failed: {e}")))?;

        let sig = sig.normalize_s().unwrap_or(sig);
        let mut out = [0u8; 64];
        out.copy_from_slice(&sig.to_bytes());
        Ok(out)
    }

    /// Overwrites the key material; the value remains usable afterwards
    /// only as all-zero bytes, never as a signing key again.
    pub fn zeroize(&mut self) {
        self.material.0.zeroize();
    }
}

/// An algorithm-tagged public verifying key.
#[derive(Clone, Copy)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    Secp256k1(k256::ecdsa::VerifyingKey),
    Secp256r1(p256::ecdsa::VerifyingKey),
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm())
            .field("bytes", &hex::encode(self.to_bytes()))
            .finish()
    }
}

impl PublicKey {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            PublicKey::Ed25519(_) => Algorithm::Ed25519,
            PublicKey::Secp256k1(_) => Algorithm::Secp256k1,
            PublicKey::Secp256r1(_) => Algorithm::Secp256r1,
        }
    }

    /// Canonical encoding: raw 32 bytes for Ed25519, compressed SEC1 point
    /// (33 bytes) for the ECDSA variants.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(vk) => vk.to_bytes().to_vec(),
            PublicKey::Secp256k1(vk) => vk.to_encoded_point(true).as_bytes().to_vec(),
            PublicKey::Secp256r1(vk) => vk.to_encoded_point(true).as_bytes().to_vec(),
        }
    }

    pub fn from_bytes(algorithm: Algorithm, bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != algorithm.public_key_len() {
            return Err(KeyError::InvalidKey(format!(
                "{algorithm} public key must be {} bytes, got {}",
                algorithm.public_key_len(),
                bytes.len()
            )));
        }
        match algorithm {
            Algorithm::Ed25519 => {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| KeyError::InvalidKey("bad ed25519 public key length".into()))?;
                let vk = ed25519_dalek::VerifyingKey::from_bytes(&arr)
                    .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
                Ok(PublicKey::Ed25519(vk))
            }
            Algorithm::Secp256k1 => {
                let vk = k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                    .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
                Ok(PublicKey::Secp256k1(vk))
            }
            Algorithm::Secp256r1 => {
                let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                    .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
                Ok(PublicKey::Secp256r1(vk))
            }
        }
    }

    /// Verifies a signature. Deterministically rejects any input whose
    /// length isn't exactly 64 bytes before doing any cryptographic work,
    /// and accepts both low-S and high-S ECDSA signatures (permissive
    /// reader, strict writer).
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        if signature.len() != Algorithm::SIGNATURE_LEN {
            return false;
        }
        match self {
            PublicKey::Ed25519(vk) => {
                let Ok(sig) = ed25519_dalek::Signature::from_slice(signature) else {
                    return false;
                };
                vk.verify(message, &sig).is_ok()
            }
            PublicKey::Secp256k1(vk) => {
                let Ok(sig) = k256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                vk.verify(message, &sig).is_ok()
            }
            PublicKey::Secp256r1(vk) => {
                let Ok(sig) = p256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                vk.verify(message, &sig).is_ok()
            }
        }
    }

    /// Constant-time equality after an algorithm check (a Secp256k1 key
    /// can never equal a Secp256r1 key, even with identical bytes).
    pub fn equals(&self, other: &PublicKey) -> bool {
        self.algorithm() == other.algorithm() && constant_time_eq(&self.to_bytes(), &other.to_bytes())
    }

    /// Base64 (standard alphabet) of [`PublicKey::to_bytes`].
    pub fn to_string_encoded(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_round_trips_through_string() {
        for algo in [Algorithm::Ed25519, Algorithm::Secp256k1, Algorithm::Secp256r1] {
            assert_eq!(Algorithm::parse(algo.as_str()).unwrap(), algo);
        }
    }

    #[test]
    fn ed25519_sign_and_verify_round_trip() {
        let key = PrivateKey::generate(Algorithm::Ed25519).unwrap();
        let pk = key.public_key().unwrap();
        let sig = key.sign(b"hello").unwrap();
        assert!(pk.verify(b"hello", &sig));
        assert!(!pk.verify(b"goodbye", &sig));
    }

    #[test]
    fn secp256k1_sign_and_verify_round_trip() {
        let key = PrivateKey::generate(Algorithm::Secp256k1).unwrap();
        let pk = key.public_key().unwrap();
        let sig = key.sign(b"hello").unwrap();
        assert!(pk.verify(b"hello", &sig));
    }

    #[test]
    fn secp256r1_sign_is_deterministic_and_low_s() {
        let d = hex::decode("c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721")
            .unwrap();
        let key = PrivateKey::from_bytes(Algorithm::Secp256r1, &d).unwrap();
        let sig1 = key.sign(b"sample").unwrap();
        let sig2 = key.sign(b"sample").unwrap();
        assert_eq!(sig1, sig2);
        assert!(signature_utils::is_low_s(&sig1, Algorithm::Secp256r1));
        let pk = key.public_key().unwrap();
        assert!(pk.verify(b"sample", &sig1));
    }

    #[test]
    fn secp256k1_known_vector_public_key() {
        let mut priv_bytes = [0u8; 32];
        priv_bytes[31] = 1;
        let key = PrivateKey::from_bytes(Algorithm::Secp256k1, &priv_bytes).unwrap();
        let pk = key.public_key().unwrap();
        assert_eq!(
            hex::encode(pk.to_bytes()),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn private_key_from_bytes_reproduces_same_public_key() {
        for algo in [Algorithm::Ed25519, Algorithm::Secp256k1, Algorithm::Secp256r1] {
            let key = PrivateKey::generate(algo).unwrap();
            let pk1 = key.public_key().unwrap();
            let round_tripped = PrivateKey::from_bytes(algo, &key.to_bytes()).unwrap();
            let pk2 = round_tripped.public_key().unwrap();
            assert!(pk1.equals(&pk2));
        }
    }

    #[test]
    fn public_key_from_bytes_round_trips() {
        for algo in [Algorithm::Ed25519, Algorithm::Secp256k1, Algorithm::Secp256r1] {
            let key = PrivateKey::generate(algo).unwrap();
            let pk = key.public_key().unwrap();
            let pk2 = PublicKey::from_bytes(algo, &pk.to_bytes()).unwrap();
            assert!(pk.equals(&pk2));
        }
    }

    #[test]
    fn verify_rejects_wrong_length_signature_without_cryptographic_work() {
        let key = PrivateKey::generate(Algorithm::Ed25519).unwrap();
        let pk = key.public_key().unwrap();
        assert!(!pk.verify(b"hello", &[0u8; 63]));
        assert!(!pk.verify(b"hello", &[0u8; 65]));
    }

    #[test]
    fn bit_flip_in_signature_is_rejected() {
        for algo in [Algorithm::Ed25519, Algorithm::Secp256k1, Algorithm::Secp256r1] {
            let key = PrivateKey::generate(algo).unwrap();
            let pk = key.public_key().unwrap();
            let sig = key.sign(b"test message").unwrap();
            for i in 0..sig.len() {
                let mut tampered = sig;
                tampered[i] = !tampered[i];
                assert!(!pk.verify(b"test message", &tampered));
            }
        }
    }

    #[test]
    fn zeroize_clears_private_material() {
        let mut key = PrivateKey::generate(Algorithm::Ed25519).unwrap();
        key.zeroize();
        assert!(key.material.as_slice().iter().all(|&b| b == 0));
    }

    fn any_algorithm() -> impl proptest::strategy::Strategy<Value = Algorithm> {
        proptest::prop_oneof![
            proptest::strategy::Just(Algorithm::Ed25519),
            proptest::strategy::Just(Algorithm::Secp256k1),
            proptest::strategy::Just(Algorithm::Secp256r1),
        ]
    }

    proptest::proptest! {
        #[test]
        fn sign_then_verify_always_holds(algo in any_algorithm(), message in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let key = PrivateKey::generate(algo).unwrap();
            let pk = key.public_key().unwrap();
            let sig = key.sign(&message).unwrap();
            proptest::prop_assert!(pk.verify(&message, &sig));
        }

        #[test]
        fn ecdsa_signatures_are_always_low_s(message in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            for algo in [Algorithm::Secp256k1, Algorithm::Secp256r1] {
                let key = PrivateKey::generate(algo).unwrap();
                let sig = key.sign(&message).unwrap();
                proptest::prop_assert!(signature_utils::is_low_s(&sig, algo));
            }
        }

        #[test]
        fn private_key_bytes_round_trip_to_the_same_public_key(algo in any_algorithm()) {
            let key = PrivateKey::generate(algo).unwrap();
            let restored = PrivateKey::from_bytes(algo, &key.to_bytes()).unwrap();
            proptest::prop_assert!(key.public_key().unwrap().equals(&restored.public_key().unwrap()));
        }
    }
}
