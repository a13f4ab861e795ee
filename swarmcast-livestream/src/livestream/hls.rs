use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::router::{MediaRouter, LOCAL_SUBSCRIBER};
use crate::address::{StreamAddress, StreamFormat};
use crate::error::{StreamError, StreamResult};
use crate::protocols::hls::{HlsBuffer, MediaBuffer};
use crate::relay::{best_effort_stop, trigger_forward};

impl MediaRouter {
    /// Resolve an HLS playback path to a buffer that has a playlist to serve.
    pub(crate) async fn hls_playback(&self, request_path: &str) -> StreamResult<Arc<dyn MediaBuffer>> {
        let address = StreamAddress::parse(request_path);
        if !address.is_valid() {
            error!(path = %request_path, "Cannot find stream");
            return Err(StreamError::NotFound(format!("no stream address in {request_path}")));
        }

        if self.streamer.get_network_stream(&address).is_none() {
            if address.is_owned_by(&self.node_id()) {
                info!(stream_id = %address, "Cannot find owned HLS stream, returning not found");
                return Err(StreamError::NotFound(address.to_string()));
            }
            info!(stream_id = %address, "Cannot find HLS stream locally, forwarding request to the network");
            trigger_forward(self.forwarder.as_ref(), &address, StreamFormat::Hls);
        }

        let buffer = self.local_buffer(&address).await?;
        self.await_ready(&address, buffer).await
    }

    /// Existing local buffer for `address`, or a freshly subscribed one.
    async fn local_buffer(&self, address: &StreamAddress) -> StreamResult<Arc<dyn MediaBuffer>> {
        if let Some(buffer) = self.streamer.get_hls_muxer(address, LOCAL_SUBSCRIBER) {
            return Ok(buffer);
        }

        let _guard = self.creation_locks.acquire(address).await;
        // Double-check: another request may have created it while we waited
        if let Some(buffer) = self.streamer.get_hls_muxer(address, LOCAL_SUBSCRIBER) {
            return Ok(buffer);
        }

        info!(stream_id = %address, "Creating new HLS buffer");
        let buffer: Arc<dyn MediaBuffer> = Arc::new(HlsBuffer::new(
            self.config.buffer_window,
            self.config.buffer_capacity,
        ));
        self.streamer
            .subscribe_to_hls_stream(address, LOCAL_SUBSCRIBER, Arc::clone(&buffer))
            .inspect_err(|e| error!(stream_id = %address, "Error subscribing to HLS stream: {}", e))?;

        // The registry keeps the first buffer subscribed under an id
        Ok(self
            .streamer
            .get_hls_muxer(address, LOCAL_SUBSCRIBER)
            .unwrap_or(buffer))
    }

    /// Poll until the buffer yields a playlist or the wait ceiling passes.
    async fn await_ready(
        &self,
        address: &StreamAddress,
        buffer: Arc<dyn MediaBuffer>,
    ) -> StreamResult<Arc<dyn MediaBuffer>> {
        let started = Instant::now();
        loop {
            match buffer.latest_playlist() {
                Ok(_) => {
                    self.timers.touch(address);
                    return Ok(buffer);
                }
                Err(e) => debug!(stream_id = %address, "Playlist not ready: {}", e),
            }

            tokio::time::sleep(self.config.poll_interval).await;
            if started.elapsed() > self.config.wait_time {
                warn!(
                    stream_id = %address,
                    waited = ?started.elapsed(),
                    "HLS buffer never became ready"
                );
                self.abandon_buffer(address, &buffer);
                return Err(StreamError::NotFound(format!("{address} has no playlist yet")));
            }
        }
    }

    /// Drop a subscription nobody will ever read, so it does not outlive the
    /// request that created it. The reaper only sees addresses with activity.
    fn abandon_buffer(&self, address: &StreamAddress, buffer: &Arc<dyn MediaBuffer>) {
        let still_ours = self
            .streamer
            .get_hls_muxer(address, LOCAL_SUBSCRIBER)
            .is_some_and(|current| Arc::ptr_eq(&current, buffer));
        if !still_ours {
            return;
        }

        self.timers.remove(address);
        if let Err(e) = self
            .streamer
            .unsubscribe_to_hls_stream(address, LOCAL_SUBSCRIBER)
        {
            debug!(stream_id = %address, "HLS buffer already unsubscribed: {}", e);
        }
        if !address.is_owned_by(&self.node_id()) {
            best_effort_stop(self.forwarder.as_ref(), address, StreamFormat::Hls);
        }
    }
}
