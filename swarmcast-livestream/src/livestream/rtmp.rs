// RTMP ingest and playback resolution.

use std::sync::Arc;
use swarmcast_core::NodeId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::router::{MediaRouter, HLS_STREAM_QUERY};
use crate::address::{random_subscriber_id, StreamAddress, StreamFormat};
use crate::error::{StreamError, StreamResult};
use crate::protocols::rtmp::{copy_packets, MuxCloser, PacketQueue};
use crate::relay::{best_effort_stop, trigger_forward, NetworkStream};

/// Use `supplied` when present, else mint a fresh address for `node`, then
/// insist the node owns it.
fn owned_address(supplied: StreamAddress, node: &NodeId, role: &str) -> StreamResult<StreamAddress> {
    let address = if supplied.is_empty() {
        StreamAddress::mint(node)
    } else {
        supplied
    };
    if !address.is_owned_by(node) {
        error!(stream_id = %address, "Invalid {} address: owner component must be this node", role);
        return Err(StreamError::StreamPublish(format!(
            "{role} address {address} is not owned by {node}"
        )));
    }
    Ok(address)
}

impl MediaRouter {
    /// Resolve a publish URL to its raw (RTMP) and packaged (HLS) streams.
    pub(crate) fn rtmp_publish(&self, url: &Url) -> StreamResult<(Arc<NetworkStream>, Arc<NetworkStream>)> {
        let node = self.node_id();

        let raw_address = owned_address(StreamAddress::parse(url.path()), &node, "RTMP")?;
        let hls_query = url
            .query_pairs()
            .find(|(key, _)| key == HLS_STREAM_QUERY)
            .map(|(_, value)| StreamAddress::from(value.into_owned()))
            .unwrap_or_default();
        // Both addresses are checked before anything is registered
        let hls_address = owned_address(hls_query, &node, "HLS")?;

        let raw = match self.streamer.get_network_stream(&raw_address) {
            Some(stream) => stream,
            None => self
                .streamer
                .add_new_network_stream(&raw_address, StreamFormat::Rtmp)
                .map_err(|e| {
                    error!(stream_id = %raw_address, "Error creating RTMP stream: {}", e);
                    StreamError::StreamPublish(e.to_string())
                })?,
        };

        // Every session gets a fresh packaging pipeline
        let packaged = self
            .streamer
            .add_new_network_stream(&hls_address, StreamFormat::Hls)
            .map_err(|e| {
                error!(stream_id = %hls_address, "Error creating HLS stream: {}", e);
                StreamError::StreamPublish(e.to_string())
            })?;

        info!(stream_id = %raw.address, "RTMP stream published");
        info!(stream_id = %packaged.address, "HLS stream published");
        self.viz.log_broadcast(&raw.address);
        self.viz.log_broadcast(&packaged.address);

        Ok((raw, packaged))
    }

    /// Tear down a publish session. Unconditional and best-effort.
    pub(crate) fn finish_session(&self, raw: &StreamAddress, packaged: &StreamAddress) {
        info!(rtmp_stream = %raw, hls_stream = %packaged, "Finishing publish session");
        if self.streamer.delete_network_stream(raw).is_none() {
            debug!(stream_id = %raw, "RTMP stream was already gone");
        }
        if self.streamer.delete_network_stream(packaged).is_none() {
            debug!(stream_id = %packaged, "HLS stream was already gone");
        }
        self.streamer.unsubscribe_all(raw);
        self.streamer.unsubscribe_all(packaged);
        // Forced unsubscribes leave nothing for the reaper to evict
        self.timers.remove(raw);
        self.timers.remove(packaged);
    }

    /// Subscribe a fresh queue to the stream and drain it into `sink`.
    pub(crate) async fn rtmp_playback(
        &self,
        cancel: CancellationToken,
        request_path: &str,
        sink: &mut dyn MuxCloser,
    ) -> StreamResult<()> {
        let address = StreamAddress::parse(request_path);
        if address.is_empty() {
            error!(path = %request_path, "Cannot find stream");
            return Err(StreamError::NotFound(format!("no stream address in {request_path}")));
        }

        self.viz.log_consume(&address);

        if self.streamer.get_network_stream(&address).is_none() {
            info!(stream_id = %address, "No local RTMP stream found, forwarding request to the network");
            trigger_forward(self.forwarder.as_ref(), &address, StreamFormat::Rtmp);
        }

        let (writer, mut reader) = PacketQueue::new(self.config.queue_capacity);
        let sub_id = random_subscriber_id();
        self.streamer
            .subscribe_to_rtmp_stream(&address, &sub_id, writer)
            .inspect_err(|e| error!(stream_id = %address, "Error subscribing to stream: {}", e))?;

        let result = tokio::select! {
            result = copy_packets(sink, &mut reader) => result,
            () = cancel.cancelled() => Err(StreamError::Cancelled),
        };

        // Already gone if the publisher finished the session
        if let Err(e) = self.streamer.unsubscribe_to_rtmp_stream(&address, &sub_id) {
            debug!(stream_id = %address, sub_id = %sub_id, "Unsubscribe skipped: {}", e);
        }
        best_effort_stop(self.forwarder.as_ref(), &address, StreamFormat::Rtmp);

        match &result {
            Ok(()) => info!(stream_id = %address, "RTMP playback ended upstream"),
            Err(StreamError::Cancelled) => info!(stream_id = %address, "RTMP playback cancelled"),
            Err(e) => warn!(stream_id = %address, "Error copying to player: {}", e),
        }
        result
    }
}
