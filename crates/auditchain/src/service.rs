//! The audit service: classify, append, anchor.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use auditchain_core::{Address, AnchorOutcome, Blake3Hash, Identity, Keypair, LogInfo, SignedEvent};
use auditchain_ledger::{AnchorVerification, LedgerClient};
use auditchain_store::ChainStore;

use crate::anchorer::EventChainAnchorer;
use crate::chain_store::EventChainStore;
use crate::error::Result;

/// Options for [`AuditService`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Run an anchoring round right after every append.
    pub anchor_after_append: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            anchor_after_append: true,
        }
    }
}

/// What happened to the ledger after an append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnchorSummary {
    Anchored { entries: usize },
    Empty,
    /// The round failed; the event is picked up by the next one.
    Deferred { reason: String },
    Disabled,
}

impl From<&AnchorOutcome> for AnchorSummary {
    fn from(outcome: &AnchorOutcome) -> Self {
        match outcome {
            AnchorOutcome::Anchored(batch) => AnchorSummary::Anchored {
                entries: batch.len(),
            },
            AnchorOutcome::Empty => AnchorSummary::Empty,
        }
    }
}

/// Result of logging one event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedEvent {
    pub event_message: Map<String, Value>,
    pub position: usize,
    pub hash: Blake3Hash,
    pub anchor: AnchorSummary,
}

/// Totals of one sweep over every subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub subjects: usize,
    pub anchored_entries: usize,
    pub failures: usize,
}

pub struct AuditService<S, L> {
    store: Arc<S>,
    chains: EventChainStore<S>,
    anchorer: EventChainAnchorer<S, L>,
    options: ServiceOptions,
}

impl<S: ChainStore, L: LedgerClient> AuditService<S, L> {
    pub fn new(store: Arc<S>, ledger: Arc<L>, signer: Keypair, options: ServiceOptions) -> Self {
        Self {
            chains: EventChainStore::new(store.clone(), signer),
            anchorer: EventChainAnchorer::new(store.clone(), ledger),
            store,
            options,
        }
    }

    pub fn chains(&self) -> &EventChainStore<S> {
        &self.chains
    }

    pub fn anchorer(&self) -> &EventChainAnchorer<S, L> {
        &self.anchorer
    }

    /// Classify a log request and append it to the identity's chain.
    ///
    /// An empty `userId` defaults to the identity's address and a missing
    /// timestamp to now. Ledger trouble after the append does not fail the
    /// call; it is reported in [`LoggedEvent::anchor`].
    pub async fn log_event(&self, identity: &Identity, mut info: LogInfo) -> Result<LoggedEvent> {
        if info.user_id.is_empty() {
            info.user_id = identity.address.to_string();
        }
        if info.timestamp.is_none() {
            info.timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }

        let event_message = info.classify()?.to_payload()?;
        let appended = self
            .chains
            .append(&identity.address, event_message.clone())
            .await?;

        let anchor = if self.options.anchor_after_append {
            match self.anchorer.anchor(&identity.address).await {
                Ok(outcome) => AnchorSummary::from(&outcome),
                Err(e) => {
                    tracing::warn!(subject = %identity.address, error = %e, "anchoring deferred");
                    AnchorSummary::Deferred {
                        reason: e.to_string(),
                    }
                }
            }
        } else {
            AnchorSummary::Disabled
        };

        Ok(LoggedEvent {
            event_message,
            position: appended.position,
            hash: appended.event.content_hash,
            anchor,
        })
    }

    /// The subject's events, in append order.
    pub async fn logs(&self, subject: &Address) -> Result<Vec<SignedEvent>> {
        self.chains.read(subject).await
    }

    pub async fn anchor(&self, subject: &Address) -> Result<AnchorOutcome> {
        self.anchorer.anchor(subject).await
    }

    pub async fn verify_anchors(&self, subject: &Address) -> Result<AnchorVerification> {
        self.anchorer.verify(subject).await
    }

    /// Anchor every stored chain. Failures are logged and counted.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let subjects = self.store.list_subjects().await?;
        let mut report = SweepReport {
            subjects: subjects.len(),
            ..Default::default()
        };

        for subject in &subjects {
            match self.anchorer.anchor(subject).await {
                Ok(outcome) => report.anchored_entries += outcome.anchored_len(),
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(subject = %subject, error = %e, "sweep could not anchor chain");
                }
            }
        }

        if report.anchored_entries > 0 || report.failures > 0 {
            tracing::info!(
                subjects = report.subjects,
                entries = report.anchored_entries,
                failures = report.failures,
                "anchoring sweep finished"
            );
        }
        Ok(report)
    }
}

/// Run [`AuditService::sweep`] every `every` until the task is aborted.
///
/// The first sweep runs one interval after the call.
pub fn spawn_sweep<S, L>(service: Arc<AuditService<S, L>>, every: Duration) -> tokio::task::JoinHandle<()>
where
    S: ChainStore + 'static,
    L: LedgerClient + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = service.sweep().await {
                tracing::warn!(error = %e, "anchoring sweep failed");
            }
        }
    })
}
