//! Anchor transactions.
//!
//! A transaction carries the entries of one batch, hex-encoded as the node
//! expects them, and is signed by the service key over its canonical CBOR
//! encoding (integer keys 0..=6, proofs excluded).

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use auditchain_core::{
    encode_canonical, AnchorBatch, Blake3Hash, CoreError, Ed25519PublicKey, Ed25519Signature,
    Keypair, NetworkId,
};

/// Transaction type number of anchor transactions.
pub const ANCHOR_TX_TYPE: u8 = 15;

/// Current anchor transaction version.
pub const ANCHOR_TX_VERSION: u8 = 3;

/// Fee of an anchor transaction without entries.
pub const BASE_FEE: u64 = 25_000_000;

/// Additional fee per anchored entry.
pub const FEE_PER_ANCHOR: u64 = 10_000_000;

mod keys {
    pub const TYPE: u64 = 0;
    pub const VERSION: u64 = 1;
    pub const NETWORK: u64 = 2;
    pub const SENDER: u64 = 3;
    pub const TIMESTAMP: u64 = 4;
    pub const FEE: u64 = 5;
    pub const ANCHORS: u64 = 6;
}

/// One hex-encoded `key -> value` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexAnchor {
    pub key: String,
    pub value: String,
}

/// A signed anchor transaction as broadcast to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorTransaction {
    #[serde(rename = "type")]
    pub tx_type: u8,
    pub version: u8,
    pub sender_public_key: Ed25519PublicKey,
    pub network: NetworkId,
    pub timestamp: i64,
    pub fee: u64,
    pub anchors: Vec<HexAnchor>,
    #[serde(default)]
    pub proofs: Vec<Ed25519Signature>,
}

impl AnchorTransaction {
    /// An unsigned transaction for the batch.
    pub fn new(network: NetworkId, sender: Ed25519PublicKey, timestamp: i64, batch: &AnchorBatch) -> Self {
        let anchors = batch
            .entries
            .iter()
            .map(|e| HexAnchor {
                key: e.key.to_hex(),
                value: e.value.to_hex(),
            })
            .collect::<Vec<_>>();

        Self {
            tx_type: ANCHOR_TX_TYPE,
            version: ANCHOR_TX_VERSION,
            sender_public_key: sender,
            network,
            timestamp,
            fee: BASE_FEE + FEE_PER_ANCHOR * anchors.len() as u64,
            anchors,
            proofs: Vec::new(),
        }
    }

    /// Build and sign in one step.
    pub fn signed(
        signer: &Keypair,
        network: NetworkId,
        timestamp: i64,
        batch: &AnchorBatch,
    ) -> Result<Self, CoreError> {
        let mut tx = Self::new(network, signer.public_key(), timestamp, batch);
        tx.sign_with(signer)?;
        Ok(tx)
    }

    /// The bytes proofs are computed over.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let anchors = self
            .anchors
            .iter()
            .map(|a| {
                Value::Array(vec![
                    Value::Text(a.key.clone()),
                    Value::Text(a.value.clone()),
                ])
            })
            .collect();

        let value = Value::Map(vec![
            (Value::Integer(keys::TYPE.into()), Value::Integer(self.tx_type.into())),
            (Value::Integer(keys::VERSION.into()), Value::Integer(self.version.into())),
            (
                Value::Integer(keys::NETWORK.into()),
                Value::Integer(self.network.as_byte().into()),
            ),
            (
                Value::Integer(keys::SENDER.into()),
                Value::Bytes(self.sender_public_key.as_bytes().to_vec()),
            ),
            (Value::Integer(keys::TIMESTAMP.into()), Value::Integer(self.timestamp.into())),
            (Value::Integer(keys::FEE.into()), Value::Integer(self.fee.into())),
            (Value::Integer(keys::ANCHORS.into()), Value::Array(anchors)),
        ]);

        encode_canonical(&value)
    }

    /// Transaction id: hash of the canonical bytes.
    pub fn id(&self) -> Result<Blake3Hash, CoreError> {
        Ok(Blake3Hash::hash(&self.canonical_bytes()?))
    }

    /// Append a proof by `signer`.
    pub fn sign_with(&mut self, signer: &Keypair) -> Result<(), CoreError> {
        let proof = signer.sign(&self.canonical_bytes()?);
        self.proofs.push(proof);
        Ok(())
    }

    /// Check that the first proof is a valid signature by the sender.
    pub fn verify(&self) -> Result<(), CoreError> {
        let proof = self.proofs.first().ok_or(CoreError::InvalidSignature)?;
        self.sender_public_key.verify(&self.canonical_bytes()?, proof)
    }
}
