// MediaRouter: decides between local service and network forwarding, and owns
// the subscription lifecycle for both delivery protocols.

use std::sync::Arc;
use std::time::Duration;
use swarmcast_core::config::{HlsConfig, RtmpConfig};
use swarmcast_core::NodeId;

use super::creation_lock::CreationLocks;
use super::timers::SubscriptionTimers;
use crate::relay::{Forwarder, Streamer, VizSink};

/// Subscriber id of the single buffer that serves all local HLS playback.
pub const LOCAL_SUBSCRIBER: &str = "local";

/// Query parameter naming the packaged (HLS) address on publish.
pub const HLS_STREAM_QUERY: &str = "hlsStrmID";

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Ceiling on the readiness wait
    pub wait_time: Duration,
    pub poll_interval: Duration,
    pub buffer_window: usize,
    pub buffer_capacity: usize,
    /// Per-viewer RTMP queue depth
    pub queue_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::from_config(&HlsConfig::default(), &RtmpConfig::default())
    }
}

impl RouterConfig {
    #[must_use]
    pub fn from_config(hls: &HlsConfig, rtmp: &RtmpConfig) -> Self {
        Self {
            wait_time: hls.wait_time(),
            poll_interval: hls.poll_interval(),
            buffer_window: hls.buffer_window,
            buffer_capacity: hls.buffer_capacity,
            queue_capacity: rtmp.queue_capacity,
        }
    }

    /// Override the readiness timings (used by tests).
    #[must_use]
    pub fn with_timeouts(mut self, wait_time: Duration, poll_interval: Duration) -> Self {
        self.wait_time = wait_time;
        self.poll_interval = poll_interval;
        self
    }
}

pub struct MediaRouter {
    pub(crate) streamer: Arc<dyn Streamer>,
    pub(crate) forwarder: Arc<dyn Forwarder>,
    pub(crate) viz: Arc<dyn VizSink>,
    pub(crate) timers: Arc<SubscriptionTimers>,
    pub(crate) creation_locks: Arc<CreationLocks>,
    pub(crate) config: RouterConfig,
}

impl MediaRouter {
    pub fn new(
        streamer: Arc<dyn Streamer>,
        forwarder: Arc<dyn Forwarder>,
        viz: Arc<dyn VizSink>,
        config: RouterConfig,
    ) -> Self {
        Self {
            streamer,
            forwarder,
            viz,
            timers: Arc::new(SubscriptionTimers::new()),
            creation_locks: Arc::new(CreationLocks::new()),
            config,
        }
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.streamer.self_address()
    }

    #[must_use]
    pub fn streamer(&self) -> &Arc<dyn Streamer> {
        &self.streamer
    }

    /// Activity registry shared with the idle reaper
    #[must_use]
    pub fn timers(&self) -> &Arc<SubscriptionTimers> {
        &self.timers
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}
