//! Cryptographic primitives for auditchain.
//!
//! Wraps Ed25519 signing and Blake3 hashing with strong types. All of them
//! serialize as lowercase hex strings so stored chains stay readable.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CoreError;

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], CoreError> {
    let bytes = hex::decode(s).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CoreError::DecodingError(format!("want {N} bytes, found {len}")))
}

/// Fixed-size byte newtype that travels as lowercase hex.
macro_rules! hex_bytes {
    ($(#[$meta:meta])* $name:ident, $len:literal, $label:literal) => {
        $(#[$meta])*
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, CoreError> {
                decode_fixed::<$len>(s).map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let hex = self.to_hex();
                write!(f, concat!($label, "({}..)"), &hex[..12])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                Self::from_hex(&text).map_err(de::Error::custom)
            }
        }
    };
}

hex_bytes!(
    /// Blake3 digest: content hashes, chain seeds, cursors.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    Blake3Hash,
    32,
    "blake3"
);

hex_bytes!(
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    Ed25519PublicKey,
    32,
    "pubkey"
);

hex_bytes!(
    #[derive(Clone, Copy, PartialEq, Eq)]
    Ed25519Signature,
    64,
    "sig"
);

impl Blake3Hash {
    /// All zeroes. Never produced by hashing.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// `blake3(domain || data)`.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let digest = blake3::Hasher::new().update(domain).update(data).finalize();
        Self(digest.into())
    }
}

impl fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex()[..16])
    }
}

impl Ed25519PublicKey {
    /// Check `signature` over `message` against this key.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        key.verify(message, &Signature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

/// Ed25519 signing key. Used for the service key that attests events and
/// ledger transactions, and by clients to sign requests.
#[derive(Clone)]
pub struct Keypair(SigningKey);

impl Keypair {
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut rand::thread_rng()))
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(seed))
    }

    /// Parse a hex seed, as found in configuration.
    pub fn from_seed_hex(s: &str) -> Result<Self, CoreError> {
        let seed = decode_fixed::<32>(s.trim())?;
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.0.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.0.sign(message).to_bytes())
    }

    /// Secret seed bytes.
    pub fn seed(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keypair").field(&self.public_key()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_binds_message_and_key() {
        let signer = Keypair::from_seed(&[7; 32]);
        let sig = signer.sign(b"auditchain-event-v0:abc");

        assert!(signer.public_key().verify(b"auditchain-event-v0:abc", &sig).is_ok());
        assert!(matches!(
            signer.public_key().verify(b"auditchain-event-v0:abd", &sig),
            Err(CoreError::InvalidSignature)
        ));
        let other = Keypair::from_seed(&[8; 32]).public_key();
        assert!(other.verify(b"auditchain-event-v0:abc", &sig).is_err());
    }

    #[test]
    fn test_seed_hex_matches_raw_seed() {
        let hex_seed = format!("  {}\n", "42".repeat(32));
        let parsed = Keypair::from_seed_hex(&hex_seed).unwrap();
        assert_eq!(parsed.public_key(), Keypair::from_seed(&[0x42; 32]).public_key());
        assert_eq!(parsed.seed(), [0x42; 32]);

        assert!(Keypair::from_seed_hex("abcd").is_err());
        assert!(Keypair::from_seed_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_domain_changes_digest() {
        let a = Blake3Hash::hash_with_domain(b"auditchain-chain-seed-v0:", b"014c");
        let b = Blake3Hash::hash_with_domain(b"auditchain-address-v0:", b"014c");
        assert_ne!(a, b);
        assert_eq!(a, Blake3Hash::hash(b"auditchain-chain-seed-v0:014c"));
    }

    #[test]
    fn test_hex_serde() {
        let h = Blake3Hash::from_bytes([0xab; 32]);
        assert_eq!(serde_json::to_value(h).unwrap(), serde_json::json!("ab".repeat(32)));
        assert_eq!(Blake3Hash::from_hex(&h.to_hex()).unwrap(), h);
        assert_eq!(h.to_string(), "ab".repeat(8));

        let short = serde_json::json!("00".repeat(32));
        assert!(serde_json::from_value::<Ed25519Signature>(short).is_err());
    }
}
