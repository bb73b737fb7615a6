//! Event chains: append-only, hash-linked sequences of signed events.
//!
//! The first event links to a seed derived from the subject's address, every
//! later event links to the content hash of its predecessor. Order is append
//! order; timestamps are not consulted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::address::Address;
use crate::anchor::AnchorEntry;
use crate::crypto::{Blake3Hash, Keypair};
use crate::error::{CoreError, ValidationError};
use crate::event::SignedEvent;

const CHAIN_SEED_DOMAIN: &[u8] = b"auditchain-chain-seed-v0:";

/// The events recorded for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChain {
    subject: Address,
    events: Vec<SignedEvent>,
}

impl EventChain {
    /// The `previous_hash` of a subject's first event.
    pub fn seed(subject: &Address) -> Blake3Hash {
        Blake3Hash::hash_with_domain(CHAIN_SEED_DOMAIN, subject.as_str().as_bytes())
    }

    /// An empty chain for a subject.
    pub fn new(subject: Address) -> Self {
        Self {
            subject,
            events: Vec::new(),
        }
    }

    /// Wrap already-persisted events. Call [`verify`](Self::verify) to check them.
    pub fn from_events(subject: Address, events: Vec<SignedEvent>) -> Self {
        Self { subject, events }
    }

    pub fn subject(&self) -> &Address {
        &self.subject
    }

    pub fn events(&self) -> &[SignedEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<SignedEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The hash the next event must link to.
    pub fn last_hash(&self) -> Blake3Hash {
        self.events
            .last()
            .map(|e| e.content_hash)
            .unwrap_or_else(|| Self::seed(&self.subject))
    }

    /// Sign and append a new event. Returns the appended event.
    pub fn append(
        &mut self,
        signer: &Keypair,
        payload: Map<String, Value>,
        timestamp: i64,
    ) -> Result<&SignedEvent, CoreError> {
        let event = SignedEvent::create(signer, payload, timestamp, self.last_hash())?;
        self.events.push(event);
        Ok(&self.events[self.events.len() - 1])
    }

    /// Check content hashes, links and signatures of every event.
    ///
    /// Reports the first failure by index.
    pub fn verify(&self) -> Result<(), ValidationError> {
        let mut expected = Self::seed(&self.subject);

        for (index, event) in self.events.iter().enumerate() {
            if event.recompute_content_hash()? != event.content_hash {
                return Err(ValidationError::ContentHashMismatch { index });
            }
            if event.previous_hash != expected {
                return Err(ValidationError::BrokenLink {
                    index,
                    expected,
                    got: event.previous_hash,
                });
            }
            if event.verify_signature().is_err() {
                return Err(ValidationError::SignatureFailed { index });
            }
            expected = event.content_hash;
        }

        Ok(())
    }

    /// Index of the event with the given content hash.
    pub fn position_of(&self, hash: &Blake3Hash) -> Option<usize> {
        self.events.iter().position(|e| &e.content_hash == hash)
    }

    /// Events strictly after `cursor`, or every event when the cursor is unset.
    pub fn starting_after(&self, cursor: Option<&Blake3Hash>) -> Result<&[SignedEvent], CoreError> {
        match cursor {
            None => Ok(&self.events),
            Some(hash) => self
                .position_of(hash)
                .map(|i| &self.events[i + 1..])
                .ok_or(CoreError::UnknownCursor(*hash)),
        }
    }

    /// Events up to and including `cursor`, or none when the cursor is unset.
    pub fn prefix_through(&self, cursor: Option<&Blake3Hash>) -> Result<&[SignedEvent], CoreError> {
        match cursor {
            None => Ok(&[]),
            Some(hash) => self
                .position_of(hash)
                .map(|i| &self.events[..=i])
                .ok_or(CoreError::UnknownCursor(*hash)),
        }
    }

    /// `(content_hash -> previous_hash)` for every event, in chain order.
    pub fn anchor_map(&self) -> Vec<AnchorEntry> {
        self.events.iter().map(AnchorEntry::from_event).collect()
    }
}
