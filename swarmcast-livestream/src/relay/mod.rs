// Stream table, fan-out and the collaborators routing talks to
pub mod forwarder;
pub mod local_streamer;
pub mod mocks;
pub mod peers;
pub mod streamer;
pub mod viz;

pub use forwarder::{best_effort_stop, trigger_forward, ChannelForwarder, ForwardEvent, Forwarder};
pub use local_streamer::LocalStreamer;
pub use peers::{PeerDirectory, StaticPeers};
pub use streamer::{NetworkStream, Streamer};
pub use viz::{VizClient, VizSink};
