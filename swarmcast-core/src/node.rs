//! Node identity.
//!
//! Every node owns a 32-byte key. Stream addresses embed the owner's key in
//! hex so any node can tell from an address alone who is responsible for it.

use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Width of a node id rendered as hex.
pub const NODE_ID_HEX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId([u8; 32]);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NodeIdError {
    #[error("expected {NODE_ID_HEX_LEN} hex characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl NodeId {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random node id (used when no key is configured)
    #[must_use]
    pub fn random() -> Self {
        Self(rand::thread_rng().gen())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != NODE_ID_HEX_LEN {
            return Err(NodeIdError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| NodeIdError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }
}
