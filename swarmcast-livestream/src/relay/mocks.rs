// Test doubles for the router's collaborators.
//
// Exported so integration tests and downstream crates can drive the routers
// without a network layer.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::forwarder::Forwarder;
use super::viz::VizSink;
use crate::address::{StreamAddress, StreamFormat};
use crate::protocols::hls::{BufferError, HlsBuffer, HlsSegment, MediaBuffer, MediaPlaylist};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardCall {
    Stream,
    StopStream,
}

/// Forwarder that records every call.
#[derive(Debug, Default)]
pub struct MockForwarder {
    calls: Mutex<Vec<(ForwardCall, StreamAddress, StreamFormat)>>,
    fail_stop: AtomicBool,
}

impl MockForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `stop_stream` fail, as it does for streams that were never forwarded.
    pub fn failing_stop() -> Self {
        let mock = Self::default();
        mock.fail_stop.store(true, Ordering::SeqCst);
        mock
    }

    pub fn calls(&self) -> Vec<(ForwardCall, StreamAddress, StreamFormat)> {
        self.calls.lock().clone()
    }

    pub fn count(&self, kind: ForwardCall) -> usize {
        self.calls.lock().iter().filter(|(k, _, _)| *k == kind).count()
    }
}

impl Forwarder for MockForwarder {
    fn stream(&self, address: &StreamAddress, format: StreamFormat) -> anyhow::Result<()> {
        self.calls
            .lock()
            .push((ForwardCall::Stream, address.clone(), format));
        Ok(())
    }

    fn stop_stream(&self, address: &StreamAddress, format: StreamFormat) -> anyhow::Result<()> {
        self.calls
            .lock()
            .push((ForwardCall::StopStream, address.clone(), format));
        if self.fail_stop.load(Ordering::SeqCst) {
            anyhow::bail!("{address} was never forwarded");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockVizSink {
    broadcasts: Mutex<Vec<StreamAddress>>,
    consumes: Mutex<Vec<StreamAddress>>,
}

impl MockVizSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcasts(&self) -> Vec<StreamAddress> {
        self.broadcasts.lock().clone()
    }

    pub fn consumes(&self) -> Vec<StreamAddress> {
        self.consumes.lock().clone()
    }
}

impl VizSink for MockVizSink {
    fn log_broadcast(&self, address: &StreamAddress) {
        self.broadcasts.lock().push(address.clone());
    }

    fn log_consume(&self, address: &StreamAddress) {
        self.consumes.lock().push(address.clone());
    }
}

/// Buffer whose readiness is scripted. Counts readiness probes.
pub struct ScriptedBuffer {
    inner: HlsBuffer,
    ready_at: Option<Instant>,
    polls: AtomicUsize,
}

impl ScriptedBuffer {
    /// Ready once `delay` has elapsed from construction.
    pub fn ready_after(delay: Duration) -> Arc<Self> {
        Arc::new(Self::with_ready_at(Some(Instant::now() + delay)))
    }

    pub fn ready() -> Arc<Self> {
        Self::ready_after(Duration::ZERO)
    }

    pub fn never_ready() -> Arc<Self> {
        Arc::new(Self::with_ready_at(None))
    }

    fn with_ready_at(ready_at: Option<Instant>) -> Self {
        let inner = HlsBuffer::new(3, 16);
        // Cannot fail on a fresh buffer
        let _ = inner.write_segment(HlsSegment::new(
            0,
            "0.ts",
            Duration::from_secs(2),
            bytes::Bytes::from_static(b"segment"),
        ));
        Self {
            inner,
            ready_at,
            polls: AtomicUsize::new(0),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl MediaBuffer for ScriptedBuffer {
    fn latest_playlist(&self) -> Result<MediaPlaylist, BufferError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match self.ready_at {
            Some(at) if Instant::now() >= at => self.inner.latest_playlist(),
            _ => Err(BufferError::Empty),
        }
    }

    fn segment(&self, name: &str) -> Option<HlsSegment> {
        self.inner.segment(name)
    }

    fn write_segment(&self, segment: HlsSegment) -> Result<(), BufferError> {
        self.inner.write_segment(segment)
    }

    fn finish(&self) {
        self.inner.finish();
    }
}
