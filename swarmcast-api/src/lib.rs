// swarmcast-api - HTTP surface of a swarmcast node
//
// Control routes (stream creation and listing, peer count, streamer status),
// HLS playlist and segment delivery, and static files.

pub mod http;

pub use http::{create_router, AppState};
