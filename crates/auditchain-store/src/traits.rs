//! Storage traits: chain snapshots, anchor cursors and authorization records.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use auditchain_core::{Address, AnchorCursor, Blake3Hash, Ed25519PublicKey, EventChain};

use crate::error::{Result, StoreError};

/// A chain snapshot together with the version it was stored at.
///
/// Version 0 means "no chain stored yet".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedChain {
    pub version: u64,
    pub chain: EventChain,
}

impl VersionedChain {
    /// An empty chain that has never been saved.
    pub fn empty(subject: Address) -> Self {
        Self {
            version: 0,
            chain: EventChain::new(subject),
        }
    }
}

/// Async interface for chain and cursor persistence.
///
/// Implementations must make [`save_chain`](Self::save_chain) and
/// [`advance_cursor`](Self::advance_cursor) atomic compare-and-swap
/// operations at the storage layer, so the guarantees hold across every
/// process sharing the store.
#[async_trait]
pub trait ChainStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Chain Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Load the stored chain for a subject, if any.
    async fn load_chain(&self, subject: &Address) -> Result<Option<VersionedChain>>;

    /// Replace the stored chain if it is still at `expected_version`.
    ///
    /// `expected_version == 0` creates the chain. Returns the new version, or
    /// [`StoreError::VersionConflict`] when another writer got there first.
    async fn save_chain(&self, expected_version: u64, chain: &EventChain) -> Result<u64>;

    /// All subjects that have a stored chain.
    async fn list_subjects(&self) -> Result<Vec<Address>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Cursor Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// The anchor cursor of a subject. Unset if nothing was anchored yet.
    async fn cursor(&self, subject: &Address) -> Result<AnchorCursor>;

    /// Move the cursor from `expected` to `to`.
    ///
    /// Fails with [`StoreError::CursorConflict`] if the stored cursor is not
    /// `expected`.
    async fn advance_cursor(
        &self,
        subject: &Address,
        expected: Option<Blake3Hash>,
        to: Blake3Hash,
    ) -> Result<()>;
}

/// Role of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Devops,
    Intern,
    Lead,
    Developer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Devops => "devops",
            Role::Intern => "intern",
            Role::Lead => "lead",
            Role::Developer => "developer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "devops" => Ok(Role::Devops),
            "intern" => Ok(Role::Intern),
            "lead" => Ok(Role::Lead),
            "developer" => Ok(Role::Developer),
            other => Err(StoreError::InvalidData(format!("unknown role: {other}"))),
        }
    }
}

/// A registered user, as maintained by the registration workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub address: Address,
    pub public_key: Ed25519PublicKey,
    pub email: String,
    pub role: Role,
    pub approved: bool,
}

/// Read-only access to registered users.
#[async_trait]
pub trait AuthorizationLookup: Send + Sync {
    /// The user registered under an address, if any.
    async fn lookup(&self, address: &Address) -> Result<Option<UserRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::Devops, Role::Intern, Role::Lead, Role::Developer] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }
}
