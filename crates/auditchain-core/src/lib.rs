//! # auditchain core
//!
//! Pure primitives for auditchain: identities, signed events, hash chains,
//! anchor batches and the log type classifier.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Address`] - Network-prefixed, checksummed identity address
//! - [`Identity`] - Network + public key + derived address
//! - [`SignedEvent`] - One immutable, service-signed log entry
//! - [`EventChain`] - Append-only, hash-linked sequence of events for a subject
//! - [`AnchorBatch`] - `(contentHash -> previousHash)` pairs submitted to a ledger
//! - [`LogTypeClassifier`] - Maps a generic log request to a canonical event
//!
//! ## Canonicalization
//!
//! Event content hashes are computed over deterministic CBOR. See [`canonical`].

pub mod address;
pub mod anchor;
pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod event;
pub mod log_type;

pub use address::{Address, Identity, NetworkId, NetworkParams, NetworkRegistry};
pub use anchor::{AnchorBatch, AnchorCursor, AnchorEntry, AnchorOutcome, AnchorStatus};
pub use canonical::{canonical_json, content_bytes, encode_canonical, signing_message};
pub use chain::EventChain;
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{ClassifyError, CoreError, ValidationError};
pub use event::SignedEvent;
pub use log_type::{CanonicalEvent, LogInfo, LogType, LogTypeClassifier};
