use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

use super::playlist::{MediaPlaylist, PlaylistEntry};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// No segment has arrived yet
    #[error("buffer has no segments yet")]
    Empty,

    #[error("buffer is closed")]
    Closed,
}

/// An encoded HLS segment.
///
/// Cheap to clone: the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlsSegment {
    pub sequence: u64,
    pub name: String,
    pub duration: Duration,
    pub data: Bytes,
}

impl HlsSegment {
    pub fn new(sequence: u64, name: impl Into<String>, duration: Duration, data: Bytes) -> Self {
        Self {
            sequence,
            name: name.into(),
            duration,
            data,
        }
    }
}

/// Consumer-side handle of an HLS subscription.
///
/// The streamer writes segments into it; playback reads playlists and
/// segments back out. `latest_playlist` doubles as the readiness probe.
pub trait MediaBuffer: Send + Sync {
    fn latest_playlist(&self) -> Result<MediaPlaylist, BufferError>;

    fn segment(&self, name: &str) -> Option<HlsSegment>;

    fn write_segment(&self, segment: HlsSegment) -> Result<(), BufferError>;

    /// Mark the stream as ended; later playlists carry `#EXT-X-ENDLIST`.
    fn finish(&self);
}

struct BufferState {
    segments: VecDeque<HlsSegment>,
    ended: bool,
}

/// Bounded circular segment buffer.
///
/// Keeps at most `capacity` segments and renders the newest `window` of them
/// into playlists.
pub struct HlsBuffer {
    window: usize,
    capacity: usize,
    state: RwLock<BufferState>,
}

impl HlsBuffer {
    #[must_use]
    pub fn new(window: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: window.clamp(1, capacity),
            capacity,
            state: RwLock::new(BufferState {
                segments: VecDeque::new(),
                ended: false,
            }),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaBuffer for HlsBuffer {
    fn latest_playlist(&self) -> Result<MediaPlaylist, BufferError> {
        let state = self.state.read();
        if state.segments.is_empty() {
            return Err(BufferError::Empty);
        }

        let skip = state.segments.len().saturating_sub(self.window);
        let entries = state
            .segments
            .iter()
            .skip(skip)
            .map(|s| PlaylistEntry {
                sequence: s.sequence,
                name: s.name.clone(),
                duration: s.duration,
            })
            .collect();

        Ok(MediaPlaylist {
            entries,
            is_ended: state.ended,
        })
    }

    fn segment(&self, name: &str) -> Option<HlsSegment> {
        self.state
            .read()
            .segments
            .iter()
            .rev()
            .find(|s| s.name == name)
            .cloned()
    }

    fn write_segment(&self, segment: HlsSegment) -> Result<(), BufferError> {
        let mut state = self.state.write();
        if state.ended {
            return Err(BufferError::Closed);
        }
        state.segments.push_back(segment);
        while state.segments.len() > self.capacity {
            state.segments.pop_front();
        }
        Ok(())
    }

    fn finish(&self) {
        self.state.write().ended = true;
    }
}
