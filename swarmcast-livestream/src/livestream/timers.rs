// Last-activity registry for local HLS subscriptions.
//
// Written by playback resolution (refresh) and the idle reaper (evict), which
// run concurrently, so entries live in a DashMap.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::address::StreamAddress;

#[derive(Debug, Default)]
pub struct SubscriptionTimers {
    entries: DashMap<StreamAddress, Instant>,
}

impl SubscriptionTimers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `address` as watched right now.
    pub fn touch(&self, address: &StreamAddress) {
        self.entries.insert(address.clone(), Instant::now());
    }

    #[must_use]
    pub fn last_access(&self, address: &StreamAddress) -> Option<Instant> {
        self.entries.get(address).map(|e| *e.value())
    }

    pub fn remove(&self, address: &StreamAddress) -> Option<Instant> {
        self.entries.remove(address).map(|(_, at)| at)
    }

    /// Addresses idle for longer than `limit`.
    #[must_use]
    pub fn stale(&self, limit: Duration) -> Vec<StreamAddress> {
        self.entries
            .iter()
            .filter(|e| e.value().elapsed() > limit)
            .map(|e| e.key().clone())
            .collect()
    }

    /// Remove `address` only if it is still idle for longer than `limit`.
    ///
    /// A refresh that lands between [`stale`](Self::stale) and this call keeps
    /// the entry alive.
    pub fn remove_if_stale(&self, address: &StreamAddress, limit: Duration) -> bool {
        self.entries
            .remove_if(address, |_, at| at.elapsed() > limit)
            .is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(local: &str) -> StreamAddress {
        StreamAddress::from(format!("{}{local}", "0f".repeat(32)))
    }

    #[test]
    fn test_touch_and_remove() {
        let timers = SubscriptionTimers::new();
        let a = addr("a");
        assert!(timers.is_empty());

        timers.touch(&a);
        assert_eq!(timers.len(), 1);
        assert!(timers.last_access(&a).is_some());

        assert!(timers.remove(&a).is_some());
        assert!(timers.last_access(&a).is_none());
    }

    #[test]
    fn test_stale_selection() {
        let timers = SubscriptionTimers::new();
        let old = addr("old");
        let fresh = addr("fresh");
        let limit = Duration::from_millis(20);

        timers.touch(&old);
        std::thread::sleep(Duration::from_millis(40));
        timers.touch(&fresh);

        assert_eq!(timers.stale(limit), vec![old.clone()]);
        assert!(!timers.remove_if_stale(&fresh, limit));
        assert!(timers.remove_if_stale(&old, limit));
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_refresh_beats_eviction() {
        let timers = SubscriptionTimers::new();
        let a = addr("a");
        let limit = Duration::from_millis(20);
        timers.touch(&a);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(timers.stale(limit).len(), 1);

        // Viewer polls again before the reaper gets to remove it
        timers.touch(&a);
        assert!(!timers.remove_if_stale(&a, limit));
        assert!(timers.last_access(&a).is_some());
    }
}
