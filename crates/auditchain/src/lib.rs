//! # auditchain
//!
//! A tamper-evident audit log. Every subject (an address-identified user)
//! owns a hash-linked chain of service-signed events; new events are
//! anchored incrementally to an external ledger so that any later change to
//! a stored chain can be detected.
//!
//! ## Flow
//!
//! 1. [`RequestAuthenticator`](auditchain_auth::RequestAuthenticator) checks the
//!    request signature against the address in the path and the
//!    authorization records.
//! 2. [`LogTypeClassifier`](auditchain_core::LogTypeClassifier) turns the
//!    generic log request into a canonical event payload.
//! 3. [`EventChainStore`] appends it to the subject's chain.
//! 4. [`EventChainAnchorer`] submits the unanchored suffix to the ledger.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use auditchain::{AuditService, ServiceOptions};
//! use auditchain::core::{Identity, Keypair, LogInfo, NetworkId};
//! use auditchain::ledger::MemoryLedger;
//! use auditchain::store::MemoryStore;
//!
//! async fn example() {
//!     let service = AuditService::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(MemoryLedger::new()),
//!         Keypair::generate(),
//!         ServiceOptions::default(),
//!     );
//!
//!     let user = Identity::new(NetworkId::TESTNET, Keypair::generate().public_key());
//!     let info: LogInfo = serde_json::from_str(r#"{"logType":"LOGOUT"}"#).unwrap();
//!     let logged = service.log_event(&user, info).await.unwrap();
//!     println!("event {} at position {}", logged.hash, logged.position);
//! }
//! ```

pub mod anchorer;
pub mod chain_store;
pub mod config;
pub mod error;
mod locks;
pub mod server;
pub mod service;
pub mod telemetry;

pub use auditchain_auth as auth;
pub use auditchain_core as core;
pub use auditchain_ledger as ledger;
pub use auditchain_store as store;

pub use anchorer::EventChainAnchorer;
pub use chain_store::{AppendedEvent, EventChainStore};
pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use server::{build_router, AppState};
pub use service::{spawn_sweep, AnchorSummary, AuditService, LoggedEvent, ServiceOptions, SweepReport};
