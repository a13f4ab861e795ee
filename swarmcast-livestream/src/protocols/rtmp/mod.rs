// RTMP delivery side: packets, the per-viewer fan-out queue and the copy loop
// that drains a queue into a player connection. Muxing happens in the sink.

pub mod copy;
pub mod packet;
pub mod queue;

pub use copy::{copy_packets, ChannelSink, MuxCloser};
pub use packet::{MediaPacket, PacketKind};
pub use queue::{PacketQueue, PushError, QueueReader, QueueWriter};
