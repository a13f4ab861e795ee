// Idle HLS subscription eviction.
//
// A single loop; never runs concurrently with itself, but does race playback
// resolution refreshing the same timers.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use super::creation_lock::CreationLocks;
use super::router::{MediaRouter, LOCAL_SUBSCRIBER};
use super::timers::SubscriptionTimers;
use crate::address::StreamFormat;
use crate::relay::{best_effort_stop, Forwarder, Streamer};

/// Creation locks untouched this long are dropped by the sweep
const CREATION_LOCK_MAX_AGE: Duration = Duration::from_secs(600);

pub struct IdleReaper {
    streamer: Arc<dyn Streamer>,
    forwarder: Arc<dyn Forwarder>,
    timers: Arc<SubscriptionTimers>,
    creation_locks: Arc<CreationLocks>,
    interval: Duration,
    idle_limit: Duration,
}

impl IdleReaper {
    #[must_use]
    pub fn new(router: &MediaRouter, interval: Duration, idle_limit: Duration) -> Self {
        Self {
            streamer: Arc::clone(&router.streamer),
            forwarder: Arc::clone(&router.forwarder),
            timers: Arc::clone(&router.timers),
            creation_locks: Arc::clone(&router.creation_locks),
            interval,
            idle_limit,
        }
    }

    /// Evict every subscription idle for longer than the limit.
    ///
    /// Returns the number of evicted addresses.
    pub fn sweep(&self) -> usize {
        let mut evicted = 0;
        for address in self.timers.stale(self.idle_limit) {
            // Lost the race against a refresh: the viewer is back
            if !self.timers.remove_if_stale(&address, self.idle_limit) {
                continue;
            }

            info!(stream_id = %address, "Evicting idle HLS subscription");
            if let Err(e) = self
                .streamer
                .unsubscribe_to_hls_stream(&address, LOCAL_SUBSCRIBER)
            {
                warn!(stream_id = %address, "Failed to unsubscribe idle HLS buffer: {}", e);
            }
            best_effort_stop(self.forwarder.as_ref(), &address, StreamFormat::Hls);
            self.creation_locks.remove(&address);
            evicted += 1;
        }

        let dropped = self.creation_locks.cleanup_older_than(CREATION_LOCK_MAX_AGE);
        if dropped > 0 {
            debug!("Cleaned up {} stale creation lock entries", dropped);
        }
        evicted
    }

    /// Run the sweep loop until `shutdown` is cancelled.
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        let span = tracing::info_span!("idle_reaper");
        tokio::spawn(
            async move {
                info!(
                    interval = ?self.interval,
                    idle_limit = ?self.idle_limit,
                    "Idle reaper started"
                );
                let mut interval = tokio::time::interval(self.interval);
                // The first tick completes immediately
                interval.tick().await;
                loop {
                    tokio::select! {
                        () = shutdown.cancelled() => {
                            info!("Idle reaper stopped");
                            break;
                        }
                        _ = interval.tick() => {
                            let evicted = self.sweep();
                            if evicted > 0 {
                                debug!("Evicted {} idle HLS subscriptions", evicted);
                            }
                        }
                    }
                }
            }
            .instrument(span),
        )
    }
}
