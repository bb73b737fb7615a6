//! # auditchain store
//!
//! Persistence for event chains, anchor cursors and the authorization
//! records consulted by the request authenticator.
//!
//! ## Key Types
//!
//! - [`ChainStore`] - Versioned chain snapshots and anchor cursors
//! - [`AuthorizationLookup`] - Read-only view of registered users
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Concurrency
//!
//! Every chain snapshot carries a version. [`ChainStore::save_chain`] only
//! succeeds when the caller saw the current version, so two writers racing
//! on the same subject (in one process or many sharing the database) can
//! never both commit. The loser gets [`StoreError::VersionConflict`].
//! Cursors advance the same way, by compare-and-swap on the previous value.
//!
//! ## Layout
//!
//! Chains, cursors and user records live in separate tables
//! (`event_chains`, `anchor_cursors`, `registered_users`); no key is shared
//! between them.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AuthorizationLookup, ChainStore, Role, UserRecord, VersionedChain};
