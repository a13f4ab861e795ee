// Delivery primitives. Neither touches codecs: HLS segments arrive encoded and
// RTMP packets arrive demuxed.
pub mod hls;
pub mod rtmp;

pub use hls::{HlsBuffer, HlsSegment, MediaBuffer, MediaPlaylist};
pub use rtmp::{copy_packets, MediaPacket, MuxCloser, PacketQueue};
