//! Signed events: the immutable unit of an event chain.
//!
//! An event is attested by the service key, not by the subject. The
//! subject's own signature only authenticates the request that caused it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonical::{content_bytes, signing_message};
use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::CoreError;

/// One log entry in an event chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedEvent {
    /// Opaque, schema-agnostic payload.
    pub payload: Map<String, Value>,

    /// Unix milliseconds at creation. Informational only; chain order is
    /// append order.
    pub timestamp: i64,

    /// Content hash of the preceding event, or the chain seed.
    pub previous_hash: Blake3Hash,

    /// Hash of `(payload, timestamp, previous_hash)`.
    pub content_hash: Blake3Hash,

    /// Service key that attested this event.
    pub signer_public_key: Ed25519PublicKey,

    /// Signature over the content hash.
    pub signature: Ed25519Signature,
}

impl SignedEvent {
    /// Build and sign a new event.
    pub fn create(
        signer: &Keypair,
        payload: Map<String, Value>,
        timestamp: i64,
        previous_hash: Blake3Hash,
    ) -> Result<Self, CoreError> {
        let content_hash = Self::compute_content_hash(&payload, timestamp, &previous_hash)?;
        let signature = signer.sign(&signing_message(&content_hash));

        Ok(Self {
            payload,
            timestamp,
            previous_hash,
            content_hash,
            signer_public_key: signer.public_key(),
            signature,
        })
    }

    /// Compute the content hash of the given fields.
    pub fn compute_content_hash(
        payload: &Map<String, Value>,
        timestamp: i64,
        previous_hash: &Blake3Hash,
    ) -> Result<Blake3Hash, CoreError> {
        let bytes = content_bytes(payload, timestamp, previous_hash)?;
        Ok(Blake3Hash::hash(&bytes))
    }

    /// Recompute the content hash from this event's fields.
    pub fn recompute_content_hash(&self) -> Result<Blake3Hash, CoreError> {
        Self::compute_content_hash(&self.payload, self.timestamp, &self.previous_hash)
    }

    /// Check that the stored hash matches the content and the signature
    /// verifies under the signer key.
    pub fn verify(&self) -> Result<(), CoreError> {
        if self.recompute_content_hash()? != self.content_hash {
            return Err(CoreError::ContentHashMismatch);
        }
        self.verify_signature()
    }

    /// Verify only the signature over the stored content hash.
    pub fn verify_signature(&self) -> Result<(), CoreError> {
        self.signer_public_key
            .verify(&signing_message(&self.content_hash), &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(action: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("action".into(), json!(action));
        m
    }

    #[test]
    fn test_create_and_verify() {
        let kp = Keypair::from_seed(&[3; 32]);
        let event = SignedEvent::create(&kp, payload("user_login"), 1_000, Blake3Hash::ZERO).unwrap();

        assert_eq!(event.signer_public_key, kp.public_key());
        assert_eq!(event.recompute_content_hash().unwrap(), event.content_hash);
        event.verify().unwrap();
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let kp = Keypair::generate();
        let mut event =
            SignedEvent::create(&kp, payload("user_login"), 1_000, Blake3Hash::ZERO).unwrap();
        event.payload.insert("status".into(), json!("forged"));
        assert!(matches!(event.verify(), Err(CoreError::ContentHashMismatch)));
    }

    #[test]
    fn test_foreign_signature_fails() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let mut event =
            SignedEvent::create(&kp, payload("deployment"), 5, Blake3Hash::ZERO).unwrap();
        event.signer_public_key = other.public_key();
        assert!(event.verify_signature().is_err());
    }

    #[test]
    fn test_serializes_camel_case_hex() {
        let kp = Keypair::from_seed(&[1; 32]);
        let event = SignedEvent::create(&kp, payload("user_logout"), 42, Blake3Hash::ZERO).unwrap();
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["previousHash"], "00".repeat(32));
        assert_eq!(json["contentHash"], event.content_hash.to_hex());
        assert_eq!(json["signerPublicKey"], kp.public_key().to_hex());

        let back: SignedEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
