// Per-address creation locks, so concurrent playback misses on the same
// address build one buffer between them.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::address::StreamAddress;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

struct CreationLockEntry {
    lock: Arc<Mutex<()>>,
    last_accessed: AtomicU64,
}

impl CreationLockEntry {
    fn new() -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            last_accessed: AtomicU64::new(now_secs()),
        }
    }

    fn touch(&self) {
        self.last_accessed.store(now_secs(), Ordering::Relaxed);
    }

    /// Nobody holds or waits on the mutex
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.lock) == 1
    }

    fn age(&self) -> Duration {
        Duration::from_secs(now_secs().saturating_sub(self.last_accessed.load(Ordering::Relaxed)))
    }
}

#[derive(Default)]
pub struct CreationLocks {
    locks: DashMap<StreamAddress, Arc<CreationLockEntry>>,
}

impl CreationLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the returned guard while creating the buffer for `address`.
    pub async fn acquire(&self, address: &StreamAddress) -> OwnedMutexGuard<()> {
        let lock = {
            let entry = self
                .locks
                .entry(address.clone())
                .or_insert_with(|| Arc::new(CreationLockEntry::new()));
            entry.touch();
            Arc::clone(&entry.lock)
        };
        lock.lock_owned().await
    }

    /// Forget the lock once the subscription it guarded is gone.
    ///
    /// A lock that is held or awaited stays, so later callers keep queueing
    /// on the same mutex. Returns whether the entry went.
    pub fn remove(&self, address: &StreamAddress) -> bool {
        self.locks
            .remove_if(address, |_, entry| entry.is_idle())
            .is_some()
    }

    /// Drop idle locks untouched for longer than `max_age`. Returns how many went.
    pub fn cleanup_older_than(&self, max_age: Duration) -> usize {
        let before = self.locks.len();
        self.locks
            .retain(|_, entry| !entry.is_idle() || entry.age() <= max_age);
        before.saturating_sub(self.locks.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_address_serialises() {
        let locks = Arc::new(CreationLocks::new());
        let a = StreamAddress::from("abc");

        let guard = locks.acquire(&a).await;
        let contender = {
            let locks = Arc::clone(&locks);
            let a = a.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&a).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_and_remove() {
        let locks = CreationLocks::new();
        let a = StreamAddress::from("a");
        drop(locks.acquire(&a).await);

        assert_eq!(locks.cleanup_older_than(Duration::from_secs(600)), 0);
        assert!(locks.remove(&a));
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_remove_keeps_held_lock() {
        let locks = Arc::new(CreationLocks::new());
        let a = StreamAddress::from("held");

        let guard = locks.acquire(&a).await;
        assert!(!locks.remove(&a));
        assert_eq!(locks.cleanup_older_than(Duration::ZERO), 0);

        // A later caller still queues behind the holder
        let contender = {
            let locks = Arc::clone(&locks);
            let a = a.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&a).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert!(locks.remove(&a));
        assert!(locks.is_empty());
    }
}
