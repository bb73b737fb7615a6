//! Anchor batches and cursors.
//!
//! An anchor entry commits one event: its content hash (key) and the hash it
//! links to (value). A batch holds the entries of a chain's unanchored
//! suffix and is submitted to the ledger as one unit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::address::Address;
use crate::crypto::Blake3Hash;
use crate::event::SignedEvent;

/// One `(content_hash -> previous_hash)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorEntry {
    pub key: Blake3Hash,
    pub value: Blake3Hash,
}

impl AnchorEntry {
    pub fn from_event(event: &SignedEvent) -> Self {
        Self {
            key: event.content_hash,
            value: event.previous_hash,
        }
    }
}

/// Entries submitted to the ledger as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorBatch {
    pub subject: Address,
    pub entries: Vec<AnchorEntry>,
}

impl AnchorBatch {
    /// Build a batch from a run of consecutive chain events.
    pub fn from_events(subject: Address, events: &[SignedEvent]) -> Self {
        Self {
            subject,
            entries: events.iter().map(AnchorEntry::from_event).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The key the cursor advances to once this batch is accepted.
    pub fn last_key(&self) -> Option<Blake3Hash> {
        self.entries.last().map(|e| e.key)
    }

    /// Hex-encoded `{key: value}` map, the shape ledger nodes accept.
    pub fn to_hex_map(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.key.to_hex(), e.value.to_hex()))
            .collect()
    }
}

/// The last content hash of a subject's chain committed to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorCursor {
    pub subject: Address,
    pub last_anchored: Option<Blake3Hash>,
}

impl AnchorCursor {
    /// A cursor with nothing anchored yet.
    pub fn unset(subject: Address) -> Self {
        Self {
            subject,
            last_anchored: None,
        }
    }
}

/// Ledger status of one anchor entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorStatus {
    Committed,
    Unknown,
}

/// Result of one anchoring round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorOutcome {
    /// The batch was accepted and the cursor advanced.
    Anchored(AnchorBatch),
    /// Nothing new since the last anchored event.
    Empty,
}

impl AnchorOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Number of entries anchored in this round.
    pub fn anchored_len(&self) -> usize {
        match self {
            Self::Anchored(batch) => batch.len(),
            Self::Empty => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::NetworkId;
    use crate::chain::EventChain;
    use crate::crypto::Keypair;
    use serde_json::Map;

    #[test]
    fn test_batch_from_suffix() {
        let kp = Keypair::from_seed(&[4; 32]);
        let subject = Address::derive(NetworkId::MAINNET, &kp.public_key());
        let mut chain = EventChain::new(subject.clone());
        for ts in 0..3 {
            chain.append(&kp, Map::new(), ts).unwrap();
        }

        let batch = AnchorBatch::from_events(subject, &chain.events()[1..]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.entries[0].value, chain.events()[0].content_hash);
        assert_eq!(batch.last_key(), Some(chain.last_hash()));

        let map = batch.to_hex_map();
        assert_eq!(
            map.get(&chain.last_hash().to_hex()),
            Some(&chain.events()[1].content_hash.to_hex())
        );
    }

    #[test]
    fn test_outcome_len() {
        assert_eq!(AnchorOutcome::Empty.anchored_len(), 0);
        assert!(AnchorOutcome::Empty.is_empty());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AnchorStatus::Committed).unwrap(),
            "\"committed\""
        );
    }
}
