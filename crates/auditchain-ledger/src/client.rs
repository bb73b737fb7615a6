//! The ledger capability the anchoring workflow depends on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use auditchain_core::{Address, AnchorBatch, AnchorEntry, AnchorStatus, NetworkParams};

use crate::error::Result;
use crate::transaction::AnchorTransaction;

/// Confirmation that a batch was accepted by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorReceipt {
    /// Identifier of the transaction that carried the batch.
    pub tx_id: String,
    /// Number of entries committed.
    pub entries: usize,
}

/// Ledger status of one anchor entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStatus {
    #[serde(flatten)]
    pub entry: AnchorEntry,
    pub status: AnchorStatus,
}

/// Per-entry result of [`LedgerClient::verify_anchors`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorVerification {
    pub entries: Vec<EntryStatus>,
}

impl AnchorVerification {
    /// True when every entry is committed. Vacuously true for no entries.
    pub fn all_committed(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.status == AnchorStatus::Committed)
    }

    pub fn committed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == AnchorStatus::Committed)
            .count()
    }
}

/// Operations the service needs from a ledger.
///
/// Submitting the same batch twice must be harmless: callers retry after
/// transient failures without knowing whether the first attempt landed.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Commit every entry of the batch. Returns once the ledger accepted it.
    async fn anchor(&self, batch: &AnchorBatch) -> Result<AnchorReceipt>;

    /// Query which entries of the batch are committed. Read-only.
    async fn verify_anchors(&self, batch: &AnchorBatch) -> Result<AnchorVerification>;

    /// Parameters of the network an address belongs to.
    fn resolve_network(&self, address: &Address) -> Result<NetworkParams>;

    /// Submit an already-signed transaction. Returns its id.
    async fn broadcast(&self, transaction: &AnchorTransaction) -> Result<String>;
}
