// Forwarder: seam to the overlay network that retrieves streams from peers.
//
// Calls are triggers, not transfers: they must return immediately. The
// channel-backed implementation hands events to whatever network layer drains
// the receiver.

use dashmap::DashSet;
use tokio::sync::mpsc;
use tracing::debug;

use crate::address::{StreamAddress, StreamFormat};

pub trait Forwarder: Send + Sync {
    /// Start retrieving `address` from the network.
    fn stream(&self, address: &StreamAddress, format: StreamFormat) -> anyhow::Result<()>;

    /// Stop retrieving `address`. Fails when nothing was being forwarded.
    fn stop_stream(&self, address: &StreamAddress, format: StreamFormat) -> anyhow::Result<()>;
}

/// Fire a forward request without waiting on the outcome.
///
/// The outcome is intentionally discarded: playback proceeds regardless and
/// succeeds only if data shows up.
pub fn trigger_forward(forwarder: &dyn Forwarder, address: &StreamAddress, format: StreamFormat) {
    if let Err(e) = forwarder.stream(address, format) {
        debug!(stream_id = %address, %format, "Forward request failed: {}", e);
    }
}

/// Stop forwarding, discarding failures.
///
/// Stopping a stream that was only ever local is expected to fail; the failure
/// is logged at debug rather than escalated.
pub fn best_effort_stop(forwarder: &dyn Forwarder, address: &StreamAddress, format: StreamFormat) {
    if let Err(e) = forwarder.stop_stream(address, format) {
        debug!(stream_id = %address, %format, "Stop forwarding ignored: {}", e);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardEvent {
    Stream {
        address: StreamAddress,
        format: StreamFormat,
    },
    StopStream {
        address: StreamAddress,
        format: StreamFormat,
    },
}

/// Forwarder that turns calls into [`ForwardEvent`]s on a bounded channel.
pub struct ChannelForwarder {
    tx: mpsc::Sender<ForwardEvent>,
    active: DashSet<(StreamAddress, StreamFormat)>,
}

impl ChannelForwarder {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ForwardEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                active: DashSet::new(),
            },
            rx,
        )
    }

    #[must_use]
    pub fn is_forwarding(&self, address: &StreamAddress, format: StreamFormat) -> bool {
        self.active.contains(&(address.clone(), format))
    }

    fn send(&self, event: ForwardEvent) -> anyhow::Result<()> {
        self.tx
            .try_send(event)
            .map_err(|e| anyhow::anyhow!("forward channel unavailable: {e}"))
    }
}

impl Forwarder for ChannelForwarder {
    fn stream(&self, address: &StreamAddress, format: StreamFormat) -> anyhow::Result<()> {
        // Repeated triggers for an active forward are coalesced
        if !self.active.insert((address.clone(), format)) {
            return Ok(());
        }
        let sent = self.send(ForwardEvent::Stream {
            address: address.clone(),
            format,
        });
        if sent.is_err() {
            self.active.remove(&(address.clone(), format));
        }
        sent
    }

    fn stop_stream(&self, address: &StreamAddress, format: StreamFormat) -> anyhow::Result<()> {
        if self.active.remove(&(address.clone(), format)).is_none() {
            anyhow::bail!("{address} is not being forwarded as {format}");
        }
        self.send(ForwardEvent::StopStream {
            address: address.clone(),
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> StreamAddress {
        StreamAddress::from(format!("{}cam", "ab".repeat(32)))
    }

    #[tokio::test]
    async fn test_stream_then_stop() {
        let (forwarder, mut rx) = ChannelForwarder::new(8);
        let a = addr();

        forwarder.stream(&a, StreamFormat::Hls).unwrap();
        assert!(forwarder.is_forwarding(&a, StreamFormat::Hls));
        assert_eq!(
            rx.recv().await.unwrap(),
            ForwardEvent::Stream {
                address: a.clone(),
                format: StreamFormat::Hls
            }
        );

        forwarder.stop_stream(&a, StreamFormat::Hls).unwrap();
        assert!(!forwarder.is_forwarding(&a, StreamFormat::Hls));
        assert!(matches!(rx.recv().await.unwrap(), ForwardEvent::StopStream { .. }));
    }

    #[tokio::test]
    async fn test_repeated_trigger_is_coalesced() {
        let (forwarder, mut rx) = ChannelForwarder::new(8);
        let a = addr();
        forwarder.stream(&a, StreamFormat::Rtmp).unwrap();
        forwarder.stream(&a, StreamFormat::Rtmp).unwrap();

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_without_forward_fails() {
        let (forwarder, _rx) = ChannelForwarder::new(8);
        assert!(forwarder.stop_stream(&addr(), StreamFormat::Rtmp).is_err());
        // best_effort_stop swallows the same failure
        best_effort_stop(&forwarder, &addr(), StreamFormat::Rtmp);
    }

    #[test]
    fn test_full_channel_rolls_back() {
        let (forwarder, _rx) = ChannelForwarder::new(1);
        let a = addr();
        let b = StreamAddress::from(format!("{}other", "cd".repeat(32)));

        forwarder.stream(&a, StreamFormat::Hls).unwrap();
        assert!(forwarder.stream(&b, StreamFormat::Hls).is_err());
        assert!(!forwarder.is_forwarding(&b, StreamFormat::Hls));
    }
}
