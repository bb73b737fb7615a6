//! Per-subject async locks.
//!
//! These only serialize work inside one process. Writers in other processes
//! are fenced by the store's compare-and-swap. An entry lives only while a
//! task holds or waits for it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OwnedMutexGuard;

use auditchain_core::Address;

type LockMap = HashMap<Address, Arc<tokio::sync::Mutex<()>>>;

#[derive(Debug, Default)]
pub(crate) struct SubjectLocks {
    locks: Mutex<LockMap>,
}

/// Exclusive access to one subject. Dropping it releases the subject and
/// removes its entry once nobody else is waiting.
pub(crate) struct SubjectGuard<'a> {
    owner: &'a SubjectLocks,
    subject: Address,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SubjectLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to `subject`.
    pub(crate) async fn acquire(&self, subject: &Address) -> SubjectGuard<'_> {
        let lock = self.map().entry(subject.clone()).or_default().clone();
        SubjectGuard {
            owner: self,
            subject: subject.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.map().len()
    }
}

impl Drop for SubjectGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Waiters clone the Arc under the map lock, so a count of one means
        // only the map still refers to it.
        let mut map = self.owner.map();
        if map
            .get(&self.subject)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.subject);
        }
    }
}
