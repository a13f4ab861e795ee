// HLS delivery side: the per-subscription segment buffer and the playlist it
// renders. Segment encoding happens upstream; buffers only hold finished
// segments.

pub mod buffer;
pub mod playlist;

pub use buffer::{BufferError, HlsBuffer, HlsSegment, MediaBuffer};
pub use playlist::MediaPlaylist;
