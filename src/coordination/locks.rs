//! Per-transaction mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::ledger::TxHash;

/// Registry of one async lock per transaction hash.
///
/// Entries are dropped once no guard or waiter holds them, so the map only
/// grows with the number of transactions being worked on concurrently.
#[derive(Clone, Default)]
pub struct HashLocks {
    locks: Arc<Mutex<HashMap<TxHash, Arc<AsyncMutex<()>>>>>,
}

/// Exclusive access to one transaction hash.
pub struct HashGuard {
    hash: TxHash,
    registry: HashLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl HashLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `hash`.
    pub async fn acquire(&self, hash: TxHash) -> HashGuard {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(locks.entry(hash).or_default())
        };

        let guard = lock.lock_owned().await;
        HashGuard {
            hash,
            registry: self.clone(),
            guard: Some(guard),
        }
    }

    /// Number of hashes currently tracked.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, hash: &TxHash) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Only the map still references the lock: nobody holds or awaits it.
        if locks
            .get(hash)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(hash);
        }
    }
}

impl HashGuard {
    pub fn hash(&self) -> &TxHash {
        &self.hash
    }
}

impl Drop for HashGuard {
    fn drop(&mut self) {
        // Release the mutex (and its Arc) before checking whether the entry is unused.
        self.guard.take();
        self.registry.release(&self.hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entries_are_pruned_after_release() {
        let locks = HashLocks::new();
        let guard = locks.acquire(TxHash::from_bytes([1; 32])).await;
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_hash_is_exclusive() {
        let locks = HashLocks::new();
        let hash = TxHash::from_bytes([1; 32]);
        let guard = locks.acquire(hash).await;

        let contender = locks.clone();
        let waiter = tokio::spawn(async move { *contender.acquire(hash).await.hash() });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // A different hash does not contend.
        let other = locks.acquire(TxHash::from_bytes([2; 32])).await;

        drop(guard);
        assert_eq!(waiter.await.unwrap(), hash);
        drop(other);
        assert!(locks.is_empty());
    }
}
