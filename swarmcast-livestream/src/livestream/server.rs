// Livestream facade
//
// Single entry point that builds the router and spawns its background tasks.
// Front ends only ever see the `StreamHandler` it hands out.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::handler::StreamHandler;
use super::reaper::IdleReaper;
use super::router::{MediaRouter, RouterConfig};
use super::timers::SubscriptionTimers;
use crate::relay::{Forwarder, Streamer, VizSink};

#[derive(Debug, Clone)]
pub struct LivestreamConfig {
    pub router: RouterConfig,
    pub reaper_enabled: bool,
    pub reaper_interval: Duration,
    pub idle_limit: Duration,
}

impl LivestreamConfig {
    #[must_use]
    pub fn from_config(config: &swarmcast_core::Config) -> Self {
        Self {
            router: RouterConfig::from_config(&config.hls, &config.rtmp),
            reaper_enabled: config.hls.reaper_enabled,
            reaper_interval: config.hls.reaper_interval(),
            idle_limit: config.hls.idle_limit(),
        }
    }
}

/// Handle returned by [`LivestreamServer::start`].
pub struct LivestreamHandle {
    pub router: Arc<MediaRouter>,
    reaper_handle: Option<JoinHandle<()>>,
    shutdown_token: CancellationToken,
}

impl LivestreamHandle {
    /// The router behind its named front-end interface
    #[must_use]
    pub fn handler(&self) -> Arc<dyn StreamHandler> {
        Arc::clone(&self.router) as Arc<dyn StreamHandler>
    }

    #[must_use]
    pub fn timers(&self) -> &Arc<SubscriptionTimers> {
        self.router.timers()
    }

    /// Stop background tasks immediately.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
        if let Some(handle) = &self.reaper_handle {
            handle.abort();
        }
    }

    /// Signal background tasks and wait up to `timeout_secs` for them.
    ///
    /// Returns `false` if a task had to be aborted.
    pub async fn shutdown_graceful(&mut self, timeout_secs: u64) -> bool {
        use tokio::time::timeout;

        info!("Starting graceful shutdown of livestream components...");
        self.shutdown_token.cancel();

        let Some(mut handle) = self.reaper_handle.take() else {
            return true;
        };
        if timeout(Duration::from_secs(timeout_secs), &mut handle).await.is_ok() {
            info!("Idle reaper stopped");
            true
        } else {
            warn!("Idle reaper shutdown timed out");
            handle.abort();
            false
        }
    }
}

pub struct LivestreamServer {
    config: LivestreamConfig,
    streamer: Arc<dyn Streamer>,
    forwarder: Arc<dyn Forwarder>,
    viz: Arc<dyn VizSink>,
}

impl LivestreamServer {
    pub fn new(
        config: LivestreamConfig,
        streamer: Arc<dyn Streamer>,
        forwarder: Arc<dyn Forwarder>,
        viz: Arc<dyn VizSink>,
    ) -> Self {
        Self {
            config,
            streamer,
            forwarder,
            viz,
        }
    }

    /// Build the router and spawn the idle reaper (when enabled).
    pub fn start(self) -> LivestreamHandle {
        let router = Arc::new(MediaRouter::new(
            self.streamer,
            self.forwarder,
            self.viz,
            self.config.router,
        ));
        let shutdown_token = CancellationToken::new();

        let reaper_handle = if self.config.reaper_enabled {
            let reaper = IdleReaper::new(&router, self.config.reaper_interval, self.config.idle_limit);
            Some(reaper.start(shutdown_token.child_token()))
        } else {
            info!("Idle reaper disabled");
            None
        };

        info!(node = %router.node_id(), "Livestream router started");
        LivestreamHandle {
            router,
            reaper_handle,
            shutdown_token,
        }
    }
}
