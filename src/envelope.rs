//! Wire/persisted signature envelope: `{algorithm, pub_key, signature}`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::KeyError;
use crate::keys::{Algorithm, PublicKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawSignatureEnvelope {
    algorithm: String,
    pub_key: String,
    signature: String,
}

/// A signature paired with the public key that produced it, in the wire
/// format used for serialization (not the on-disk key-storage format — see
/// [`crate::store::file`] for that).
#[derive(Debug, Clone)]
pub struct SignatureEnvelope {
    pub algorithm: Algorithm,
    pub pub_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignatureEnvelope {
    pub fn new(public_key: &PublicKey, signature: [u8; 64]) -> Self {
        Self {
            algorithm: public_key.algorithm(),
            pub_key: public_key.to_bytes(),
            signature: signature.to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String, KeyError> {
        let raw = RawSignatureEnvelope {
            algorithm: self.algorithm.as_str().to_string(),
            pub_key: STANDARD.encode(&self.pub_key),
            signature: STANDARD.encode(&self.signature),
        };
        serde_json::to_string(&raw).map_err(|e| KeyError::Other(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, KeyError> {
        let raw: RawSignatureEnvelope =
            serde_json::from_str(json).map_err(|e| KeyError::Other(e.to_string()))?;
        let algorithm = Algorithm::parse(&raw.algorithm)?;
        let pub_key = STANDARD
            .decode(raw.pub_key)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        let signature = STANDARD
            .decode(raw.signature)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        if signature.len() != Algorithm::SIGNATURE_LEN {
            return Err(KeyError::InvalidKey("signature must be 64 bytes".into()));
        }
        Ok(Self {
            algorithm,
            pub_key,
            signature,
        })
    }

    /// Verifies this envelope's signature against `message` using its own
    /// embedded public key.
    pub fn verify(&self, message: &[u8]) -> Result<bool, KeyError> {
        let pk = PublicKey::from_bytes(self.algorithm, &self.pub_key)?;
        Ok(pk.verify(message, &self.signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::PrivateKey;

    #[test]
    fn envelope_round_trips_through_json() {
        let key = PrivateKey::generate(Algorithm::Ed25519).unwrap();
        let pk = key.public_key().unwrap();
        let sig = key.sign(b"hello").unwrap();
        let envelope = SignatureEnvelope::new(&pk, sig);

        let json = envelope.to_json().unwrap();
        let decoded = SignatureEnvelope::from_json(&json).unwrap();
        assert!(decoded.verify(b"hello").unwrap());
        assert!(!decoded.verify(b"wrong").unwrap());
    }

    #[test]
    fn from_json_rejects_wrong_length_signature() {
        let json = r#"{"algorithm":"ed25519","pub_key":"AAAA","signature":"AAAA"}"#;
        assert!(SignatureEnvelope::from_json(json).is_err());
    }
}
