use thiserror::Error;
use tokio::sync::mpsc;

use super::packet::MediaPacket;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// Viewer is too slow; the packet was dropped
    #[error("queue is full")]
    Full,

    /// Viewer went away
    #[error("queue is closed")]
    Closed,
}

/// Per-viewer FIFO between the streamer's fan-out and one player.
///
/// The writer half is registered with the streamer, the reader half is drained
/// by the copy loop. Dropping every writer ends the stream for the reader.
pub struct PacketQueue;

impl PacketQueue {
    #[must_use]
    pub fn new(capacity: usize) -> (QueueWriter, QueueReader) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (QueueWriter { tx }, QueueReader { rx })
    }
}

#[derive(Clone)]
pub struct QueueWriter {
    tx: mpsc::Sender<MediaPacket>,
}

impl QueueWriter {
    /// Enqueue without waiting. Never blocks the publisher.
    pub fn try_push(&self, packet: MediaPacket) -> Result<(), PushError> {
        self.tx.try_send(packet).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PushError::Full,
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
        })
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct QueueReader {
    rx: mpsc::Receiver<MediaPacket>,
}

impl QueueReader {
    /// Next packet in arrival order; `None` once all writers are dropped and
    /// the queue is drained.
    pub async fn next(&mut self) -> Option<MediaPacket> {
        self.rx.recv().await
    }

    /// Stop accepting packets. Already queued packets can still be read.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
