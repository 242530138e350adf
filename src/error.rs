//! Error types for progwire.

use serde_json::Value;
use thiserror::Error;

use crate::http::HttpResponse;

/// Main error type for all channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Malformed message (wrong tag types, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Frame larger than the configured limit.
    #[error("Message size {size} exceeds maximum {max}")]
    MessageTooLarge { size: u32, max: u32 },

    /// A request was issued with neither a completion callback nor async results.
    #[error("Can't make a request without an async result facility or callback")]
    NoCompletionPath,

    /// A request timeout was set outside a Tokio runtime.
    #[error("Request timeouts require a Tokio runtime")]
    NoRuntime,

    /// The request timer elapsed before a response arrived.
    #[error("Timed out after {millis} ms")]
    Timeout { millis: u128 },

    /// The peer answered with an error body.
    #[error("Request rejected: {0}")]
    Rejected(Value),

    /// The peer answered an HTTP-style request with an error reply.
    #[error("Request failed with status {}", .0.status)]
    Status(HttpResponse),

    /// Progress updates are switched off for this channel.
    #[error("Progress updates are disabled on this channel")]
    ProgressDisabled,

    /// A handler reported a failure.
    #[error("Handler error: {0}")]
    Handler(String),

    /// The outbound queue of a stream transport is full.
    #[error("Send queue full")]
    QueueFull,

    /// Connection closed before the request settled.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using ChannelError.
pub type Result<T> = std::result::Result<T, ChannelError>;
