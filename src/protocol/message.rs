//! Logical wire messages and their tag keys.
//!
//! Every message on the channel is an object carrying at most one tag:
//!
//! ```text
//! request    { "_rq": id, "_b": body }
//! response   { "_rs": id, "_b": body }
//! failure    { "_rs": id, "_e": error }
//! progress   { "_pu": id, "_b": body }
//! plain      anything without the tags above
//! ```

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Short wire keys.
pub mod keys {
    /// Correlation id of a request.
    pub const REQUEST_ID: &str = "_rq";
    /// Correlation id a response answers.
    pub const RESPONSE_TO: &str = "_rs";
    /// Correlation id a progress notification belongs to.
    pub const PROGRESS_FOR: &str = "_pu";
    /// Message body.
    pub const BODY: &str = "_b";
    /// Error body of a failure response.
    pub const ERROR: &str = "_e";
    /// Method of a routed request.
    pub const METHOD: &str = "_m";
    /// Url of a routed request.
    pub const URL: &str = "_u";
    /// Status of an HTTP-style reply.
    pub const STATUS: &str = "_s";
}

/// A decoded or outbound message, by tag.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// A request expecting a response.
    Request { id: String, body: Value },
    /// A successful response.
    Response { id: String, body: Value },
    /// A failure response.
    ErrorResponse { id: String, error: Value },
    /// A progress notification for a pending request.
    Progress { id: String, body: Value },
    /// An ordinary, uncorrelated message.
    Plain(Value),
}

impl WireMessage {
    /// Correlation id carried by the message, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            WireMessage::Request { id, .. }
            | WireMessage::Response { id, .. }
            | WireMessage::ErrorResponse { id, .. }
            | WireMessage::Progress { id, .. } => Some(id),
            WireMessage::Plain(_) => None,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Request { .. } => "request",
            WireMessage::Response { .. } => "response",
            WireMessage::ErrorResponse { .. } => "error response",
            WireMessage::Progress { .. } => "progress",
            WireMessage::Plain(_) => "plain",
        }
    }
}

impl Serialize for WireMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (tag, id, body_key, body) = match self {
            WireMessage::Plain(value) => return value.serialize(serializer),
            WireMessage::Request { id, body } => (keys::REQUEST_ID, id, keys::BODY, body),
            WireMessage::Response { id, body } => (keys::RESPONSE_TO, id, keys::BODY, body),
            WireMessage::ErrorResponse { id, error } => {
                (keys::RESPONSE_TO, id, keys::ERROR, error)
            }
            WireMessage::Progress { id, body } => (keys::PROGRESS_FOR, id, keys::BODY, body),
        };

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(tag, id)?;
        map.serialize_entry(body_key, body)?;
        map.end()
    }
}
