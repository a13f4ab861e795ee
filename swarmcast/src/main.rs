mod server;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use swarmcast_core::{logging, Config, NodeId};
use swarmcast_livestream::livestream::{LivestreamConfig, LivestreamServer};
use swarmcast_livestream::relay::{
    ChannelForwarder, Forwarder, LocalStreamer, StaticPeers, Streamer, VizClient, VizSink,
};

use server::{spawn_forward_drain, SwarmcastServer};

/// Pending forward requests buffered before new ones are refused
const FORWARD_CHANNEL_CAPACITY: usize = 1024;

#[derive(Parser, Debug)]
#[command(name = "swarmcast")]
#[command(about = "Swarmcast media routing node", long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "SWARMCAST_CONFIG")]
    config: Option<String>,
}

/// Node identity from configuration, or a fresh random one
fn resolve_node_id(config: &Config) -> Result<NodeId> {
    match &config.node.node_key {
        Some(key) => Ok(key.parse()?),
        None => Ok(NodeId::random()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let config = Config::load(args.config.as_deref())?;

    // 2. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Swarmcast node starting...");
    info!("HTTP address: {}", config.http_address());

    // 4. Identity and the stream table
    let node_id = resolve_node_id(&config)?;
    info!(node = %node_id, "Node identity resolved");
    let streamer: Arc<dyn Streamer> = Arc::new(LocalStreamer::new(node_id));

    // 5. Network seams
    let (forwarder, forward_events) = ChannelForwarder::new(FORWARD_CHANNEL_CAPACITY);
    let forwarder: Arc<dyn Forwarder> = Arc::new(forwarder);
    let viz: Arc<dyn VizSink> = Arc::new(VizClient::new(node_id.to_string(), config.viz.endpoint.clone()));
    let peers = Arc::new(StaticPeers::new(config.node.peers.clone()));
    if config.viz.endpoint.is_none() {
        info!("Viz collector not configured, events are only logged");
    }

    // 6. Router and idle reaper
    let livestream = LivestreamServer::new(
        LivestreamConfig::from_config(&config),
        Arc::clone(&streamer),
        forwarder,
        viz,
    )
    .start();

    let forward_drain = spawn_forward_drain(forward_events);

    // 7. Serve until a shutdown signal arrives
    SwarmcastServer::new(config, livestream, streamer, peers, forward_drain)
        .start()
        .await
}
