// Streamer trait: the authoritative stream table and fan-out engine.
//
// Routers are clients of this trait only, so the in-memory `LocalStreamer`
// can be swapped for a network-backed one without touching routing logic.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use swarmcast_core::NodeId;

use crate::address::{StreamAddress, StreamFormat};
use crate::error::StreamResult;
use crate::protocols::hls::MediaBuffer;
use crate::protocols::rtmp::QueueWriter;

/// A logical stream owned by this node or known to be active elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkStream {
    pub address: StreamAddress,
    pub format: StreamFormat,
    pub created_at: DateTime<Utc>,
}

impl NetworkStream {
    #[must_use]
    pub fn new(address: StreamAddress, format: StreamFormat) -> Self {
        Self {
            address,
            format,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn stream_id(&self) -> &str {
        self.address.as_str()
    }
}

pub trait Streamer: Send + Sync {
    /// Id of the node this streamer runs on
    fn self_address(&self) -> NodeId;

    /// Register a stream, replacing any previous record at the same address.
    fn add_new_network_stream(
        &self,
        address: &StreamAddress,
        format: StreamFormat,
    ) -> StreamResult<Arc<NetworkStream>>;

    fn get_network_stream(&self, address: &StreamAddress) -> Option<Arc<NetworkStream>>;

    fn delete_network_stream(&self, address: &StreamAddress) -> Option<Arc<NetworkStream>>;

    fn get_all_network_streams(&self) -> Vec<Arc<NetworkStream>>;

    /// Attach an HLS buffer. Subscribing an id that already has a buffer keeps
    /// the existing one.
    fn subscribe_to_hls_stream(
        &self,
        address: &StreamAddress,
        sub_id: &str,
        buffer: Arc<dyn MediaBuffer>,
    ) -> StreamResult<()>;

    fn unsubscribe_to_hls_stream(&self, address: &StreamAddress, sub_id: &str) -> StreamResult<()>;

    /// Attach an RTMP viewer queue under a fresh subscriber id.
    fn subscribe_to_rtmp_stream(
        &self,
        address: &StreamAddress,
        sub_id: &str,
        queue: QueueWriter,
    ) -> StreamResult<()>;

    fn unsubscribe_to_rtmp_stream(&self, address: &StreamAddress, sub_id: &str) -> StreamResult<()>;

    /// Drop every HLS and RTMP subscriber of `address`.
    fn unsubscribe_all(&self, address: &StreamAddress);

    fn get_hls_muxer(&self, address: &StreamAddress, sub_id: &str) -> Option<Arc<dyn MediaBuffer>>;

    /// Human-readable status summary
    fn current_status(&self) -> String;
}
