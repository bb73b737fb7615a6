//! # auditchain testkit
//!
//! Shared test setup for the auditchain crates.
//!
//! - **Fixtures**: service key, in-memory store and ledger, registered users
//!   that sign requests with their own key
//! - **Generators**: proptest strategies for keys, addresses, payloads, log
//!   requests and whole chains
//!
//! ```rust
//! use auditchain_testkit::fixtures::TestUser;
//! use auditchain_core::NetworkId;
//!
//! let user = TestUser::from_seed(NetworkId::TESTNET, [7; 32]);
//! let request = user.sign("GET", &format!("/events/{}/logs", user.address()), "");
//! assert!(request.header("signature").is_some());
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{log_body, TestFixture, TestUser};
pub use generators::{chain_from_params, ChainParams};
