// swarmcast-livestream - stream routing for a swarmcast node
//
// Layout:
// - address     - stream addressing (owner node + local id)
// - protocols/  - delivery primitives (HLS segment buffer, RTMP packet queues)
// - relay/      - stream table and fan-out, plus the network-facing seams
//                 (forwarder, visualisation, peers)
// - livestream/ - routing, subscription lifecycle and the idle reaper

pub mod address;
pub mod error;
pub mod livestream;
pub mod protocols;
pub mod relay;

pub use address::{StreamAddress, StreamFormat};
pub use error::{StreamError, StreamResult};
pub use livestream::{
    LivestreamConfig, LivestreamHandle, LivestreamServer, MediaRouter, RouterConfig, StreamHandler,
};
pub use relay::{Forwarder, LocalStreamer, NetworkStream, Streamer};
