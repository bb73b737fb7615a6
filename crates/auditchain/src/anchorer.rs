//! Incremental anchoring of event chains.
//!
//! Each subject has a cursor at the last anchored content hash. A round
//! anchors exactly the events after the cursor and moves the cursor only
//! once the ledger accepted the batch. Retries happen inside the ledger
//! client and resubmit the same batch, so a failed round leaves the cursor
//! where it was and the next round picks up the same suffix.

use std::sync::Arc;

use auditchain_core::{Address, AnchorBatch, AnchorOutcome, EventChain};
use auditchain_ledger::{AnchorVerification, LedgerClient};
use auditchain_store::ChainStore;

use crate::chain_store::ensure_intact;
use crate::error::{Result, ServiceError};
use crate::locks::SubjectLocks;

pub struct EventChainAnchorer<S, L> {
    store: Arc<S>,
    ledger: Arc<L>,
    locks: SubjectLocks,
}

impl<S: ChainStore, L: LedgerClient> EventChainAnchorer<S, L> {
    pub fn new(store: Arc<S>, ledger: Arc<L>) -> Self {
        Self {
            store,
            ledger,
            locks: SubjectLocks::new(),
        }
    }

    /// Anchor the events appended since the last successful round.
    ///
    /// Returns [`AnchorOutcome::Empty`] when there is nothing new, and
    /// [`ServiceError::EmptyChain`] when the subject has no events at all.
    pub async fn anchor(&self, subject: &Address) -> Result<AnchorOutcome> {
        let _guard = self.locks.acquire(subject).await;

        let chain = self.load_non_empty(subject).await?;
        ensure_intact(subject, &chain)?;
        let cursor = self.store.cursor(subject).await?;

        let suffix = chain.starting_after(cursor.last_anchored.as_ref())?;
        if suffix.is_empty() {
            tracing::debug!(subject = %subject, "nothing to anchor");
            return Ok(AnchorOutcome::Empty);
        }

        let batch = AnchorBatch::from_events(subject.clone(), suffix);
        let Some(last) = batch.last_key() else {
            return Ok(AnchorOutcome::Empty);
        };

        let receipt = match self.ledger.anchor(&batch).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(subject = %subject, entries = batch.len(), error = %e, "anchoring failed, cursor unchanged");
                return Err(e.into());
            }
        };

        self.store
            .advance_cursor(subject, cursor.last_anchored, last)
            .await?;

        tracing::info!(
            subject = %subject,
            entries = batch.len(),
            tx_id = %receipt.tx_id,
            cursor = %last,
            "chain anchored"
        );

        Ok(AnchorOutcome::Anchored(batch))
    }

    /// Ask the ledger which of the already-anchored events it holds.
    pub async fn verify(&self, subject: &Address) -> Result<AnchorVerification> {
        let chain = self
            .store
            .load_chain(subject)
            .await?
            .map(|v| v.chain)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::NotFound(subject.clone()))?;
        let cursor = self.store.cursor(subject).await?;

        let prefix = chain.prefix_through(cursor.last_anchored.as_ref())?;
        if prefix.is_empty() {
            return Ok(AnchorVerification::default());
        }

        let batch = AnchorBatch::from_events(subject.clone(), prefix);
        let report = self.ledger.verify_anchors(&batch).await?;

        tracing::debug!(
            subject = %subject,
            entries = report.entries.len(),
            committed = report.committed(),
            "anchors verified"
        );
        Ok(report)
    }

    async fn load_non_empty(&self, subject: &Address) -> Result<EventChain> {
        self.store
            .load_chain(subject)
            .await?
            .map(|v| v.chain)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::EmptyChain(subject.clone()))
    }
}
