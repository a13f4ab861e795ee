use async_trait::async_trait;
use tokio::sync::mpsc;

use super::packet::MediaPacket;
use super::queue::QueueReader;
use crate::error::{StreamError, StreamResult};

/// Player-side sink for an RTMP playback session.
#[async_trait]
pub trait MuxCloser: Send {
    /// Codec headers and metadata, written once before any media packet.
    async fn write_header(&mut self, headers: &[MediaPacket]) -> anyhow::Result<()>;

    async fn write_packet(&mut self, packet: MediaPacket) -> anyhow::Result<()>;

    async fn close(&mut self) -> anyhow::Result<()>;
}

fn sink_error(e: &anyhow::Error) -> StreamError {
    StreamError::Sink(e.to_string())
}

/// Drain `src` into `dst` until the queue ends or the sink fails.
///
/// Leading header packets are gathered into a single `write_header` call.
/// Returns `Ok(())` only when the upstream ended and the sink was closed.
pub async fn copy_packets<S>(dst: &mut S, src: &mut QueueReader) -> StreamResult<()>
where
    S: MuxCloser + ?Sized,
{
    let mut headers = Vec::new();
    let mut first_media = None;
    while let Some(packet) = src.next().await {
        if packet.is_stream_header() {
            headers.push(packet);
        } else {
            first_media = Some(packet);
            break;
        }
    }

    dst.write_header(&headers).await.map_err(|e| sink_error(&e))?;

    if let Some(packet) = first_media {
        dst.write_packet(packet).await.map_err(|e| sink_error(&e))?;
        while let Some(packet) = src.next().await {
            dst.write_packet(packet).await.map_err(|e| sink_error(&e))?;
        }
    }

    dst.close().await.map_err(|e| sink_error(&e))
}

/// Sink that forwards everything into a channel.
///
/// Lets non-RTMP front ends (e.g. an HTTP-FLV response body) consume a
/// playback session. Fails once the receiving side is dropped.
pub struct ChannelSink {
    tx: mpsc::Sender<MediaPacket>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: mpsc::Sender<MediaPacket>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl MuxCloser for ChannelSink {
    async fn write_header(&mut self, headers: &[MediaPacket]) -> anyhow::Result<()> {
        for header in headers {
            self.write_packet(header.clone()).await?;
        }
        Ok(())
    }

    async fn write_packet(&mut self, packet: MediaPacket) -> anyhow::Result<()> {
        self.tx
            .send(packet)
            .await
            .map_err(|_| anyhow::anyhow!("player disconnected"))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
