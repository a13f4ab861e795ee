use thiserror::Error;

use crate::protocols::hls::BufferError;

#[derive(Error, Debug)]
pub enum StreamError {
    /// Address unparseable, stream absent and not forwardable, or the
    /// readiness wait ran out.
    #[error("Stream not found: {0}")]
    NotFound(String),

    /// Publish targeted an address this node does not own, or the registry
    /// refused to create one of the session's streams.
    #[error("Stream publish error: {0}")]
    StreamPublish(String),

    #[error("Already subscribed: {0}")]
    AlreadySubscribed(String),

    #[error("Not subscribed: {0}")]
    NotSubscribed(String),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Playback cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type StreamResult<T> = Result<T, StreamError>;

impl StreamError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
