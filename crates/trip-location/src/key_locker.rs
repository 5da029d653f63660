use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes async work per key, so reports for one trip are recorded and
/// handed to the broker in the order they were issued while different trips
/// proceed in parallel.
///
/// Lock entries are dropped once no guard or waiter references them.
#[derive(Debug)]
pub struct KeyLocker<K: Eq + Hash> {
    inner: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash> Default for KeyLocker<K> {
    fn default() -> Self {
        Self { inner: Arc::new(DashMap::new()) }
    }
}

impl<K: Eq + Hash> Clone for KeyLocker<K> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K: Eq + Hash + Clone> KeyLocker<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Waiters are served in FIFO order.
    pub async fn lock(&self, key: K) -> KeyGuard<K> {
        let lock = Arc::clone(
            self.inner.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).value(),
        );
        let guard = lock.lock_owned().await;
        KeyGuard { key, locks: Arc::clone(&self.inner), guard: Some(guard) }
    }

    /// Number of keys currently locked or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Holds a key's lock until dropped.
#[derive(Debug)]
pub struct KeyGuard<K: Eq + Hash> {
    key: K,
    locks: Arc<DashMap<K, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use realtime::TripId;

    use super::*;

    #[tokio::test]
    async fn entry_removed_after_release() {
        let locker = KeyLocker::new();
        {
            let _guard = locker.lock(TripId(1)).await;
            assert_eq!(locker.len(), 1);
        }
        assert!(locker.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn same_key_is_exclusive() {
        let locker = KeyLocker::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let first = locker.lock(TripId(1)).await;

        let waiter = {
            let locker = locker.clone();
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                let _guard = locker.lock(TripId(1)).await;
                order.lock().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().push("first");
        drop(first);

        waiter.await.unwrap();
        assert_eq!(*order.lock(), vec!["first", "second"]);
        assert!(locker.is_empty());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locker = KeyLocker::new();
        let _one = locker.lock(TripId(1)).await;
        let two = tokio::time::timeout(Duration::from_millis(50), locker.lock(TripId(2))).await;
        assert!(two.is_ok());
        assert_eq!(locker.len(), 2);
    }
}
