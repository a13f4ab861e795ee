pub mod config;
pub mod logging;
pub mod node;

pub use config::Config;
pub use node::{NodeId, NodeIdError, NODE_ID_HEX_LEN};
