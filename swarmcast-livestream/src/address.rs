//! Stream addressing.
//!
//! An address is the owning node's id (64 hex characters) immediately
//! followed by a node-local stream id. Keeping both parts alphanumeric lets an
//! address travel inside `/stream/<alnum>` request paths unescaped.

use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use swarmcast_core::{NodeId, NODE_ID_HEX_LEN};

static STREAM_PATH: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"/stream/([[:alnum:]]*)").unwrap()
});

/// Random bytes behind a freshly minted local stream id (64 hex characters).
const LOCAL_ID_BYTES: usize = 32;
/// Random bytes behind an ephemeral subscriber id.
const SUBSCRIBER_ID_BYTES: usize = 16;

/// Delivery protocol of a logical stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    Rtmp,
    Hls,
}

impl StreamFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rtmp => "rtmp",
            Self::Hls => "hls",
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite stream identifier: owner node id + local stream id.
///
/// The empty address stands for "no address supplied" and is what
/// [`StreamAddress::parse`] yields for paths without a stream component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamAddress(String);

impl StreamAddress {
    /// Extract the address from a request path of the form `/stream/<alnum>`.
    ///
    /// Anything after the alphanumeric run (`.m3u8`, a segment name, a query)
    /// is ignored. Returns the empty address when the path has no match.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        STREAM_PATH
            .captures(path)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn make(owner: &NodeId, local_id: &str) -> Self {
        Self(format!("{owner}{local_id}"))
    }

    /// Mint a new address owned by `owner` with a random local id.
    #[must_use]
    pub fn mint(owner: &NodeId) -> Self {
        Self::make(owner, &random_token(LOCAL_ID_BYTES))
    }

    /// Split into `(owner, local_id)`.
    ///
    /// Addresses too short to carry an owner split into two empty parts.
    #[must_use]
    pub fn split_components(&self) -> (&str, &str) {
        if self.0.len() < NODE_ID_HEX_LEN || !self.0.is_char_boundary(NODE_ID_HEX_LEN) {
            return ("", "");
        }
        self.0.split_at(NODE_ID_HEX_LEN)
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        self.split_components().0
    }

    #[must_use]
    pub fn local_id(&self) -> &str {
        self.split_components().1
    }

    /// Both components present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let (owner, local_id) = self.split_components();
        !owner.is_empty() && !local_id.is_empty()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn is_owned_by(&self, node: &NodeId) -> bool {
        let owner = self.owner();
        !owner.is_empty() && owner.eq_ignore_ascii_case(&node.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StreamAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Random hex token. Collisions are statistically unlikely, nothing more.
#[must_use]
pub fn random_token(num_bytes: usize) -> String {
    let mut bytes = vec![0u8; num_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Fresh id for one RTMP viewer's queue subscription.
#[must_use]
pub fn random_subscriber_id() -> String {
    random_token(SUBSCRIBER_ID_BYTES)
}
