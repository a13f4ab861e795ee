use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Video,
    Audio,
    /// onMetaData
    Metadata,
}

/// A demuxed RTMP packet as it travels through the fan-out.
///
/// Cloning is cheap: `data` is reference counted, so every viewer shares the
/// same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPacket {
    pub kind: PacketKind,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    pub data: Bytes,
    pub is_keyframe: bool,
    /// Codec sequence header (AVC/AAC config)
    pub is_header: bool,
}

impl MediaPacket {
    pub fn video(timestamp: u32, data: Bytes, is_keyframe: bool, is_header: bool) -> Self {
        Self {
            kind: PacketKind::Video,
            timestamp,
            data,
            is_keyframe,
            is_header,
        }
    }

    pub fn audio(timestamp: u32, data: Bytes, is_header: bool) -> Self {
        Self {
            kind: PacketKind::Audio,
            timestamp,
            data,
            is_keyframe: false,
            is_header,
        }
    }

    pub fn metadata(data: Bytes) -> Self {
        Self {
            kind: PacketKind::Metadata,
            timestamp: 0,
            data,
            is_keyframe: false,
            is_header: false,
        }
    }

    /// Packets a late joiner needs before any media: codec headers and metadata.
    #[must_use]
    pub fn is_stream_header(&self) -> bool {
        self.is_header || self.kind == PacketKind::Metadata
    }
}
