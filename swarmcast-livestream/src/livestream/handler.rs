use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::router::MediaRouter;
use crate::address::StreamAddress;
use crate::error::StreamResult;
use crate::protocols::hls::MediaBuffer;
use crate::protocols::rtmp::MuxCloser;
use crate::relay::NetworkStream;

/// Callbacks a protocol front end (HTTP playlist server, RTMP server) invokes.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    /// Resolve `request_path` to a buffer with a playlist ready to serve.
    ///
    /// Fails with `NotFound` when the path carries no address, when an owned
    /// stream is missing, or when the buffer never becomes ready.
    async fn resolve_hls_playback(&self, request_path: &str) -> StreamResult<Arc<dyn MediaBuffer>>;

    /// Register the raw and packaged streams of a publish session.
    ///
    /// The packaged address comes from the `hlsStrmID` query parameter. Either
    /// address is minted when absent; both must be owned by this node.
    fn resolve_rtmp_publish(&self, url: &Url) -> StreamResult<(Arc<NetworkStream>, Arc<NetworkStream>)>;

    /// Copy the stream at `request_path` into `sink` until it ends, the sink
    /// fails, or `cancel` fires.
    async fn resolve_rtmp_playback(
        &self,
        cancel: CancellationToken,
        request_path: &str,
        sink: &mut dyn MuxCloser,
    ) -> StreamResult<()>;

    fn finish_rtmp_session(&self, raw: &StreamAddress, packaged: &StreamAddress);
}

#[async_trait]
impl StreamHandler for MediaRouter {
    async fn resolve_hls_playback(&self, request_path: &str) -> StreamResult<Arc<dyn MediaBuffer>> {
        self.hls_playback(request_path).await
    }

    fn resolve_rtmp_publish(&self, url: &Url) -> StreamResult<(Arc<NetworkStream>, Arc<NetworkStream>)> {
        self.rtmp_publish(url)
    }

    async fn resolve_rtmp_playback(
        &self,
        cancel: CancellationToken,
        request_path: &str,
        sink: &mut dyn MuxCloser,
    ) -> StreamResult<()> {
        self.rtmp_playback(cancel, request_path, sink).await
    }

    fn finish_rtmp_session(&self, raw: &StreamAddress, packaged: &StreamAddress) {
        self.finish_session(raw, packaged);
    }
}
