// Routing and subscription lifecycle
//
// - router/handler: local-vs-forwarded resolution behind `StreamHandler`
// - hls/rtmp:       per-protocol resolution paths
// - timers/reaper:  activity tracking and idle eviction
// - server:         facade that wires the router and its background tasks

pub mod creation_lock;
pub mod handler;
mod hls;
pub mod reaper;
pub mod router;
mod rtmp;
pub mod server;
pub mod timers;

pub use handler::StreamHandler;
pub use reaper::IdleReaper;
pub use router::{MediaRouter, RouterConfig, HLS_STREAM_QUERY, LOCAL_SUBSCRIBER};
pub use server::{LivestreamConfig, LivestreamHandle, LivestreamServer};
pub use timers::SubscriptionTimers;
