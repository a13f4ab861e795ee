//! Server lifecycle management
//!
//! Manages the startup and shutdown of the node's components:
//! - HTTP server (control routes, HLS delivery, static files)
//! - livestream router and idle reaper
//! - forward event drain

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use swarmcast_api::AppState;
use swarmcast_core::Config;
use swarmcast_livestream::livestream::LivestreamHandle;
use swarmcast_livestream::relay::{ForwardEvent, PeerDirectory, Streamer};

/// Seconds each background task gets to stop on shutdown
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Log forward events until every sender is gone.
///
/// Stands in for the overlay network; peers that retrieve streams attach by
/// consuming the same events.
pub fn spawn_forward_drain(mut events: mpsc::Receiver<ForwardEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ForwardEvent::Stream { address, format } => {
                    info!(stream_id = %address, %format, "Forward requested");
                }
                ForwardEvent::StopStream { address, format } => {
                    debug!(stream_id = %address, %format, "Forward stopped");
                }
            }
        }
        debug!("Forward event channel closed");
    })
}

/// Swarmcast node - manages all server components
pub struct SwarmcastServer {
    config: Config,
    livestream: LivestreamHandle,
    streamer: Arc<dyn Streamer>,
    peers: Arc<dyn PeerDirectory>,
    forward_drain: JoinHandle<()>,
}

impl SwarmcastServer {
    pub fn new(
        config: Config,
        livestream: LivestreamHandle,
        streamer: Arc<dyn Streamer>,
        peers: Arc<dyn PeerDirectory>,
        forward_drain: JoinHandle<()>,
    ) -> Self {
        Self {
            config,
            livestream,
            streamer,
            peers,
            forward_drain,
        }
    }

    /// Start all servers and wait for shutdown signal
    pub async fn start(mut self) -> anyhow::Result<()> {
        info!("Starting swarmcast node...");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut http_handle = self.start_http_server(shutdown_rx).await?;

        tokio::select! {
            result = &mut http_handle => {
                if let Err(e) = result {
                    error!("HTTP server task failed: {}", e);
                }
                warn!("HTTP server stopped unexpectedly");
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
            }
        }

        let _ = shutdown_tx.send(true);
        if !http_handle.is_finished() {
            if let Err(e) = http_handle.await {
                error!("HTTP server task failed: {}", e);
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Gracefully shut down all components
    async fn shutdown(&mut self) {
        info!("Shutting down swarmcast node...");

        if !self.livestream.shutdown_graceful(SHUTDOWN_TIMEOUT_SECS).await {
            warn!("Livestream components did not stop cleanly");
        }

        info!(
            streams = self.streamer.get_all_network_streams().len(),
            "Dropping stream table"
        );
        self.forward_drain.abort();
        info!("Swarmcast node stopped");
    }

    /// Bind the HTTP listener and serve until `shutdown_rx` flips
    async fn start_http_server(&self, shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<JoinHandle<()>> {
        let http_addr: std::net::SocketAddr = self.config.http_address().parse()?;

        let state = AppState {
            handler: self.livestream.handler(),
            streamer: Arc::clone(&self.streamer),
            peers: Arc::clone(&self.peers),
        };
        let http_router = swarmcast_api::create_router(state, &self.config.http.static_dir);

        // Bind before spawning so a bad address fails startup
        let listener = tokio::net::TcpListener::bind(http_addr).await?;
        info!("HTTP server listening on {}", http_addr);

        let handle = tokio::spawn(async move {
            let mut rx = shutdown_rx;
            let graceful = async move {
                let _ = rx.changed().await;
            };

            if let Err(e) = axum::serve(listener, http_router)
                .with_graceful_shutdown(graceful)
                .await
            {
                error!("HTTP server error: {}", e);
            }

            info!("HTTP server shut down gracefully");
        });

        Ok(handle)
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
