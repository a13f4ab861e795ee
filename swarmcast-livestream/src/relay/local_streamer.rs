// In-process Streamer: stream table plus per-address fan-out.
//
// Subscriber sets are keyed by address independently of the stream table,
// since a viewer may subscribe to a forwarded stream before any record for it
// exists locally.

use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use swarmcast_core::NodeId;
use tracing::{debug, warn};

use super::streamer::{NetworkStream, Streamer};
use crate::address::{StreamAddress, StreamFormat};
use crate::error::{StreamError, StreamResult};
use crate::protocols::hls::{HlsSegment, MediaBuffer};
use crate::protocols::rtmp::{MediaPacket, PacketKind, PushError, QueueWriter};

#[derive(Default)]
struct Fanout {
    hls: HashMap<String, Arc<dyn MediaBuffer>>,
    rtmp: HashMap<String, QueueWriter>,
    /// Latest codec headers and metadata, replayed to late RTMP viewers
    headers: Vec<MediaPacket>,
}

impl Fanout {
    fn is_empty(&self) -> bool {
        self.hls.is_empty() && self.rtmp.is_empty() && self.headers.is_empty()
    }

    fn remember_header(&mut self, packet: &MediaPacket) {
        // One header per kind: a new sequence header supersedes the old one
        self.headers.retain(|h| h.kind != packet.kind);
        self.headers.push(packet.clone());
    }
}

pub struct LocalStreamer {
    node_id: NodeId,
    streams: DashMap<StreamAddress, Arc<NetworkStream>>,
    fanouts: DashMap<StreamAddress, Fanout>,
}

impl LocalStreamer {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            streams: DashMap::new(),
            fanouts: DashMap::new(),
        }
    }

    /// Fan an RTMP packet out to every viewer of `address`.
    ///
    /// Never waits on a viewer: full queues lose the packet, closed queues are
    /// pruned. Returns how many viewers received it.
    pub fn publish_packet(&self, address: &StreamAddress, packet: MediaPacket) -> usize {
        let mut fanout = self.fanouts.entry(address.clone()).or_default();
        if packet.is_stream_header() {
            fanout.remember_header(&packet);
        }

        let mut delivered = 0;
        fanout.rtmp.retain(|sub_id, writer| match writer.try_push(packet.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(PushError::Full) => {
                warn!(stream_id = %address, sub_id = %sub_id, "RTMP viewer queue full, dropping packet");
                true
            }
            Err(PushError::Closed) => {
                debug!(stream_id = %address, sub_id = %sub_id, "Pruning closed RTMP viewer queue");
                false
            }
        });
        delivered
    }

    /// Append a finished segment to every HLS buffer of `address`.
    pub fn publish_hls_segment(&self, address: &StreamAddress, segment: HlsSegment) -> usize {
        let Some(fanout) = self.fanouts.get(address) else {
            return 0;
        };

        let mut delivered = 0;
        for (sub_id, buffer) in &fanout.hls {
            match buffer.write_segment(segment.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(stream_id = %address, sub_id = %sub_id, "Skipping HLS buffer: {}", e),
            }
        }
        delivered
    }

    /// (hls, rtmp) subscriber counts for `address`
    #[must_use]
    pub fn subscriber_counts(&self, address: &StreamAddress) -> (usize, usize) {
        self.fanouts
            .get(address)
            .map_or((0, 0), |f| (f.hls.len(), f.rtmp.len()))
    }

    fn prune_if_empty(&self, address: &StreamAddress) {
        self.fanouts.remove_if(address, |_, f| f.is_empty());
    }
}

impl Streamer for LocalStreamer {
    fn self_address(&self) -> NodeId {
        self.node_id
    }

    fn add_new_network_stream(
        &self,
        address: &StreamAddress,
        format: StreamFormat,
    ) -> StreamResult<Arc<NetworkStream>> {
        if !address.is_valid() {
            return Err(StreamError::Internal(format!(
                "cannot register stream with invalid address {address:?}"
            )));
        }
        let stream = Arc::new(NetworkStream::new(address.clone(), format));
        self.streams.insert(address.clone(), Arc::clone(&stream));
        Ok(stream)
    }

    fn get_network_stream(&self, address: &StreamAddress) -> Option<Arc<NetworkStream>> {
        self.streams.get(address).map(|s| Arc::clone(s.value()))
    }

    fn delete_network_stream(&self, address: &StreamAddress) -> Option<Arc<NetworkStream>> {
        self.streams.remove(address).map(|(_, s)| s)
    }

    fn get_all_network_streams(&self) -> Vec<Arc<NetworkStream>> {
        let mut streams: Vec<_> = self.streams.iter().map(|s| Arc::clone(s.value())).collect();
        streams.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.address.cmp(&b.address)));
        streams
    }

    fn subscribe_to_hls_stream(
        &self,
        address: &StreamAddress,
        sub_id: &str,
        buffer: Arc<dyn MediaBuffer>,
    ) -> StreamResult<()> {
        if address.is_empty() {
            return Err(StreamError::NotFound("empty stream address".to_string()));
        }
        self.fanouts
            .entry(address.clone())
            .or_default()
            .hls
            .entry(sub_id.to_string())
            .or_insert(buffer);
        Ok(())
    }

    fn unsubscribe_to_hls_stream(&self, address: &StreamAddress, sub_id: &str) -> StreamResult<()> {
        let removed = self
            .fanouts
            .get_mut(address)
            .and_then(|mut f| f.hls.remove(sub_id));
        self.prune_if_empty(address);

        match removed {
            Some(buffer) => {
                buffer.finish();
                Ok(())
            }
            None => Err(StreamError::NotSubscribed(format!("{address} / {sub_id}"))),
        }
    }

    fn subscribe_to_rtmp_stream(
        &self,
        address: &StreamAddress,
        sub_id: &str,
        queue: QueueWriter,
    ) -> StreamResult<()> {
        if address.is_empty() {
            return Err(StreamError::NotFound("empty stream address".to_string()));
        }
        let mut fanout = self.fanouts.entry(address.clone()).or_default();
        if fanout.rtmp.contains_key(sub_id) {
            return Err(StreamError::AlreadySubscribed(format!("{address} / {sub_id}")));
        }

        // Late joiners need codec headers before any media
        let mut headers: Vec<_> = fanout.headers.iter().collect();
        headers.sort_by_key(|h| h.kind != PacketKind::Metadata);
        for header in headers {
            if let Err(e) = queue.try_push(header.clone()) {
                warn!(stream_id = %address, sub_id = %sub_id, "Failed to replay header: {}", e);
            }
        }

        fanout.rtmp.insert(sub_id.to_string(), queue);
        Ok(())
    }

    fn unsubscribe_to_rtmp_stream(&self, address: &StreamAddress, sub_id: &str) -> StreamResult<()> {
        let removed = self
            .fanouts
            .get_mut(address)
            .and_then(|mut f| f.rtmp.remove(sub_id));
        self.prune_if_empty(address);

        removed
            .map(|_| ())
            .ok_or_else(|| StreamError::NotSubscribed(format!("{address} / {sub_id}")))
    }

    fn unsubscribe_all(&self, address: &StreamAddress) {
        if let Some((_, fanout)) = self.fanouts.remove(address) {
            for buffer in fanout.hls.values() {
                buffer.finish();
            }
            debug!(
                stream_id = %address,
                hls = fanout.hls.len(),
                rtmp = fanout.rtmp.len(),
                "Unsubscribed all"
            );
            // Dropping the writers ends every viewer's copy loop
        }
    }

    fn get_hls_muxer(&self, address: &StreamAddress, sub_id: &str) -> Option<Arc<dyn MediaBuffer>> {
        self.fanouts
            .get(address)
            .and_then(|f| f.hls.get(sub_id).cloned())
    }

    fn current_status(&self) -> String {
        let streams = self.get_all_network_streams();
        let mut status = String::new();
        let _ = writeln!(status, "node: {}", self.node_id);
        let _ = writeln!(status, "streams: {}", streams.len());
        for stream in &streams {
            let (hls, rtmp) = self.subscriber_counts(&stream.address);
            let _ = writeln!(
                status,
                "  {} [{}] created {} hls_subscribers={} rtmp_subscribers={}",
                stream.address,
                stream.format,
                stream.created_at.to_rfc3339(),
                hls,
                rtmp
            );
        }
        status
    }
}
