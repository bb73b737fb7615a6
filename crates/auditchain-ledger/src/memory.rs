//! In-process ledger.
//!
//! Records accepted entries in memory. Duplicate submissions are accepted
//! and change nothing. Failures can be injected to exercise retry paths.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use auditchain_core::{
    Address, AnchorBatch, AnchorStatus, Blake3Hash, NetworkParams, NetworkRegistry,
};

use crate::client::{AnchorReceipt, AnchorVerification, EntryStatus, LedgerClient};
use crate::error::{LedgerError, Result};
use crate::transaction::AnchorTransaction;

/// In-memory [`LedgerClient`].
pub struct MemoryLedger {
    registry: NetworkRegistry,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    committed: HashMap<Blake3Hash, Blake3Hash>,
    submissions: Vec<AnchorBatch>,
    broadcasts: Vec<AnchorTransaction>,
    fail_next: usize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_registry(NetworkRegistry::default())
    }

    pub fn with_registry(registry: NetworkRegistry) -> Self {
        Self {
            registry,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Make the next `n` submissions fail with a transport error.
    pub fn fail_next(&self, n: usize) {
        self.state().fail_next = n;
    }

    /// Every accepted batch, in submission order.
    pub fn submissions(&self) -> Vec<AnchorBatch> {
        self.state().submissions.clone()
    }

    /// Every broadcast transaction, in submission order.
    pub fn broadcasts(&self) -> Vec<AnchorTransaction> {
        self.state().broadcasts.clone()
    }

    /// Number of distinct committed keys.
    pub fn committed_len(&self) -> usize {
        self.state().committed.len()
    }

    // A panicking test thread must not erase injected failures or records.
    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_injected_failure(inner: &mut Inner) -> Result<()> {
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(LedgerError::Transport("injected failure".into()));
        }
        Ok(())
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn anchor(&self, batch: &AnchorBatch) -> Result<AnchorReceipt> {
        let mut inner = self.state();
        Self::take_injected_failure(&mut inner)?;

        for entry in &batch.entries {
            inner.committed.insert(entry.key, entry.value);
        }
        inner.submissions.push(batch.clone());

        Ok(AnchorReceipt {
            tx_id: format!("memory-{}", inner.submissions.len()),
            entries: batch.len(),
        })
    }

    async fn verify_anchors(&self, batch: &AnchorBatch) -> Result<AnchorVerification> {
        let inner = self.state();
        let entries = batch
            .entries
            .iter()
            .map(|entry| EntryStatus {
                entry: *entry,
                status: if inner.committed.get(&entry.key) == Some(&entry.value) {
                    AnchorStatus::Committed
                } else {
                    AnchorStatus::Unknown
                },
            })
            .collect();
        Ok(AnchorVerification { entries })
    }

    fn resolve_network(&self, address: &Address) -> Result<NetworkParams> {
        Ok(self.registry.resolve(address)?.clone())
    }

    async fn broadcast(&self, transaction: &AnchorTransaction) -> Result<String> {
        let mut inner = self.state();
        Self::take_injected_failure(&mut inner)?;

        transaction.verify().map_err(|e| LedgerError::Rejected {
            status: 400,
            message: e.to_string(),
        })?;
        let id = transaction.id()?.to_hex();
        inner.broadcasts.push(transaction.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditchain_core::{EventChain, Keypair, NetworkId};
    use serde_json::Map;

    fn batch(n: i64) -> AnchorBatch {
        let kp = Keypair::from_seed(&[7; 32]);
        let subject = Address::derive(NetworkId::MAINNET, &kp.public_key());
        let mut chain = EventChain::new(subject.clone());
        for ts in 0..n {
            chain.append(&kp, Map::new(), ts).unwrap();
        }
        AnchorBatch::from_events(subject, chain.events())
    }

    #[tokio::test]
    async fn test_anchor_then_verify() {
        let ledger = MemoryLedger::new();
        let b = batch(2);

        let before = ledger.verify_anchors(&b).await.unwrap();
        assert_eq!(before.committed(), 0);

        let receipt = ledger.anchor(&b).await.unwrap();
        assert_eq!(receipt.entries, 2);

        let after = ledger.verify_anchors(&b).await.unwrap();
        assert!(after.all_committed());
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_harmless() {
        let ledger = MemoryLedger::new();
        let b = batch(3);
        ledger.anchor(&b).await.unwrap();
        ledger.anchor(&b).await.unwrap();
        assert_eq!(ledger.committed_len(), 3);
        assert_eq!(ledger.submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let ledger = MemoryLedger::new();
        ledger.fail_next(1);
        let b = batch(1);
        assert!(matches!(ledger.anchor(&b).await, Err(LedgerError::Transport(_))));
        assert!(ledger.submissions().is_empty());
        ledger.anchor(&b).await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_failure_survives_poisoning() {
        let ledger = std::sync::Arc::new(MemoryLedger::new());
        let poisoner = ledger.clone();
        let _ = std::thread::spawn(move || {
            let _held = poisoner.inner.lock().unwrap();
            panic!("poison the ledger state");
        })
        .join();
        assert!(ledger.inner.is_poisoned());

        ledger.fail_next(1);
        let b = batch(1);
        assert!(matches!(ledger.anchor(&b).await, Err(LedgerError::Transport(_))));
        ledger.anchor(&b).await.unwrap();
        assert_eq!(ledger.committed_len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_checks_proof() {
        let ledger = MemoryLedger::new();
        let kp = Keypair::generate();
        let tx = AnchorTransaction::signed(&kp, NetworkId::MAINNET, 1, &batch(1)).unwrap();
        let id = ledger.broadcast(&tx).await.unwrap();
        assert_eq!(id, tx.id().unwrap().to_hex());

        let unsigned = AnchorTransaction::new(NetworkId::MAINNET, kp.public_key(), 1, &batch(1));
        assert!(matches!(
            ledger.broadcast(&unsigned).await,
            Err(LedgerError::Rejected { status: 400, .. })
        ));
    }

    #[test]
    fn test_resolve_network() {
        let ledger = MemoryLedger::new();
        let kp = Keypair::generate();
        let address = Address::derive(NetworkId::TESTNET, &kp.public_key());
        assert_eq!(ledger.resolve_network(&address).unwrap().id, NetworkId::TESTNET);

        let foreign = Address::derive(NetworkId::from_byte(b'Z').unwrap(), &kp.public_key());
        assert!(matches!(
            ledger.resolve_network(&foreign),
            Err(LedgerError::UnsupportedNetwork(_))
        ));
    }
}
