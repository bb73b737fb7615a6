//! In-memory implementation of the store traits.
//!
//! Same semantics as SQLite, no persistence. Used by tests and by
//! deployments configured with an ephemeral store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use auditchain_core::{Address, AnchorCursor, Blake3Hash, EventChain};

use crate::error::{Result, StoreError};
use crate::traits::{AuthorizationLookup, ChainStore, UserRecord, VersionedChain};

/// In-memory store. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    chains: HashMap<Address, VersionedChain>,
    cursors: HashMap<Address, Blake3Hash>,
    users: HashMap<Address, UserRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Insert or replace a user record.
    pub async fn put_user(&self, user: UserRecord) -> Result<()> {
        self.write()?.users.insert(user.address.clone(), user);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainStore for MemoryStore {
    async fn load_chain(&self, subject: &Address) -> Result<Option<VersionedChain>> {
        Ok(self.read()?.chains.get(subject).cloned())
    }

    async fn save_chain(&self, expected_version: u64, chain: &EventChain) -> Result<u64> {
        let mut inner = self.write()?;
        let subject = chain.subject().clone();
        let actual = inner.chains.get(&subject).map_or(0, |c| c.version);

        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                subject: subject.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let version = actual + 1;
        inner.chains.insert(
            subject,
            VersionedChain {
                version,
                chain: chain.clone(),
            },
        );
        Ok(version)
    }

    async fn list_subjects(&self) -> Result<Vec<Address>> {
        let mut subjects: Vec<Address> = self.read()?.chains.keys().cloned().collect();
        subjects.sort();
        Ok(subjects)
    }

    async fn cursor(&self, subject: &Address) -> Result<AnchorCursor> {
        Ok(AnchorCursor {
            subject: subject.clone(),
            last_anchored: self.read()?.cursors.get(subject).copied(),
        })
    }

    async fn advance_cursor(
        &self,
        subject: &Address,
        expected: Option<Blake3Hash>,
        to: Blake3Hash,
    ) -> Result<()> {
        let mut inner = self.write()?;
        if inner.cursors.get(subject).copied() != expected {
            return Err(StoreError::CursorConflict {
                subject: subject.to_string(),
            });
        }
        inner.cursors.insert(subject.clone(), to);
        Ok(())
    }
}

#[async_trait]
impl AuthorizationLookup for MemoryStore {
    async fn lookup(&self, address: &Address) -> Result<Option<UserRecord>> {
        Ok(self.read()?.users.get(address).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Role;
    use auditchain_core::{Keypair, NetworkId};
    use serde_json::Map;
    use std::sync::Arc;

    fn subject(seed: u8) -> Address {
        Address::derive(NetworkId::TESTNET, &Keypair::from_seed(&[seed; 32]).public_key())
    }

    fn chain_with(subject: Address, n: i64) -> EventChain {
        let kp = Keypair::from_seed(&[0x11; 32]);
        let mut chain = EventChain::new(subject);
        for ts in 0..n {
            chain.append(&kp, Map::new(), ts).unwrap();
        }
        chain
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryStore::new();
        let s = subject(1);
        assert!(store.load_chain(&s).await.unwrap().is_none());

        let chain = chain_with(s.clone(), 2);
        assert_eq!(store.save_chain(0, &chain).await.unwrap(), 1);

        let loaded = store.load_chain(&s).await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.chain, chain);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let store = MemoryStore::new();
        let s = subject(2);
        store.save_chain(0, &chain_with(s.clone(), 1)).await.unwrap();

        let err = store.save_chain(0, &chain_with(s.clone(), 2)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict { expected: 0, actual: 1, .. }
        ));
        assert!(err.is_conflict());

        assert_eq!(store.save_chain(1, &chain_with(s, 2)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_creates_only_one_wins() {
        let store = Arc::new(MemoryStore::new());
        let s = subject(3);

        let mut handles = Vec::new();
        for n in 1..=8 {
            let store = store.clone();
            let chain = chain_with(s.clone(), n);
            handles.push(tokio::spawn(async move { store.save_chain(0, &chain).await }));
        }

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn test_cursor_compare_and_swap() {
        let store = MemoryStore::new();
        let s = subject(4);
        assert_eq!(store.cursor(&s).await.unwrap().last_anchored, None);

        let a = Blake3Hash([1; 32]);
        let b = Blake3Hash([2; 32]);
        store.advance_cursor(&s, None, a).await.unwrap();
        assert!(matches!(
            store.advance_cursor(&s, None, b).await,
            Err(StoreError::CursorConflict { .. })
        ));
        store.advance_cursor(&s, Some(a), b).await.unwrap();
        assert_eq!(store.cursor(&s).await.unwrap().last_anchored, Some(b));
    }

    #[tokio::test]
    async fn test_list_subjects_sorted() {
        let store = MemoryStore::new();
        for seed in [9, 7, 8] {
            store.save_chain(0, &chain_with(subject(seed), 1)).await.unwrap();
        }
        let subjects = store.list_subjects().await.unwrap();
        assert_eq!(subjects.len(), 3);
        assert!(subjects.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_user_lookup() {
        let store = MemoryStore::new();
        let kp = Keypair::generate();
        let address = Address::derive(NetworkId::MAINNET, &kp.public_key());
        assert!(store.lookup(&address).await.unwrap().is_none());

        let user = UserRecord {
            address: address.clone(),
            public_key: kp.public_key(),
            email: "ops@example.com".into(),
            role: Role::Devops,
            approved: true,
        };
        store.put_user(user.clone()).await.unwrap();
        assert_eq!(store.lookup(&address).await.unwrap(), Some(user));
    }
}
