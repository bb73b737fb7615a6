//! # auditchain ledger
//!
//! The external ledger that anchors are committed to, seen through the
//! [`LedgerClient`] trait. The ledger's own protocol is opaque; this crate
//! only builds anchor transactions and talks to a node over HTTP.
//!
//! ## Key Types
//!
//! - [`LedgerClient`] - `anchor`, `verify_anchors`, `resolve_network`, `broadcast`
//! - [`HttpLedgerClient`] - reqwest client for a ledger node
//! - [`MemoryLedger`] - in-process ledger with fault injection
//! - [`AnchorTransaction`] - signed anchor transaction
//! - [`RetryPolicy`] - capped exponential backoff with per-attempt timeout

pub mod client;
pub mod error;
pub mod http;
pub mod memory;
pub mod retry;
pub mod transaction;

pub use client::{AnchorReceipt, AnchorVerification, EntryStatus, LedgerClient};
pub use error::{LedgerError, Result};
pub use http::HttpLedgerClient;
pub use memory::MemoryLedger;
pub use retry::{with_retry, RetryPolicy};
pub use transaction::AnchorTransaction;
