//! Appending to and reading subjects' event chains.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};

use auditchain_core::{Address, Ed25519PublicKey, EventChain, Keypair, SignedEvent};
use auditchain_store::{ChainStore, VersionedChain};

use crate::error::{Result, ServiceError};
use crate::locks::SubjectLocks;

/// An event together with its zero-based position in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendedEvent {
    pub position: usize,
    pub event: SignedEvent,
}

/// Append-only access to event chains.
///
/// Events are signed with the service key. Appends for one subject are
/// serialized in-process and fenced across processes by the store's version
/// check; a lost race surfaces as [`ServiceError::Conflict`].
pub struct EventChainStore<S> {
    store: Arc<S>,
    signer: Keypair,
    locks: SubjectLocks,
}

impl<S: ChainStore> EventChainStore<S> {
    pub fn new(store: Arc<S>, signer: Keypair) -> Self {
        Self {
            store,
            signer,
            locks: SubjectLocks::new(),
        }
    }

    /// Public key events are signed with.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.signer.public_key()
    }

    /// Append an event stamped with the current time.
    pub async fn append(&self, subject: &Address, payload: Map<String, Value>) -> Result<AppendedEvent> {
        self.append_at(subject, payload, now_millis()).await
    }

    /// Append an event with an explicit timestamp (milliseconds).
    pub async fn append_at(
        &self,
        subject: &Address,
        payload: Map<String, Value>,
        timestamp: i64,
    ) -> Result<AppendedEvent> {
        let _guard = self.locks.acquire(subject).await;

        let VersionedChain { version, mut chain } = self
            .store
            .load_chain(subject)
            .await?
            .unwrap_or_else(|| VersionedChain::empty(subject.clone()));
        ensure_intact(subject, &chain)?;

        let event = chain.append(&self.signer, payload, timestamp)?.clone();
        let position = chain.len() - 1;

        let new_version = self.store.save_chain(version, &chain).await?;

        tracing::info!(
            subject = %subject,
            position,
            version = new_version,
            hash = %event.content_hash,
            "event appended"
        );

        Ok(AppendedEvent { position, event })
    }

    /// All events of a subject, in append order.
    ///
    /// The chain is verified before it is returned, so a tampered record
    /// is reported instead of served.
    pub async fn read(&self, subject: &Address) -> Result<Vec<SignedEvent>> {
        Ok(self.load(subject).await?.into_events())
    }

    /// The verified chain of a subject.
    pub async fn load(&self, subject: &Address) -> Result<EventChain> {
        let chain = self
            .store
            .load_chain(subject)
            .await?
            .map(|v| v.chain)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::NotFound(subject.clone()))?;

        ensure_intact(subject, &chain)?;
        Ok(chain)
    }
}

/// Refuse to serve, extend or anchor a chain that fails verification.
pub(crate) fn ensure_intact(subject: &Address, chain: &EventChain) -> Result<()> {
    chain.verify().map_err(|e| {
        tracing::error!(subject = %subject, error = %e, "stored chain failed verification");
        ServiceError::Corrupt(e)
    })
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
