//! Codec module - serialization of wire messages.
//!
//! Wire messages are JSON-shaped objects with short tag keys. The codec
//! only decides how those objects become bytes:
//!
//! - [`JsonCodec`] - UTF-8 JSON via `serde_json`
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (to_vec_named, so
//!   objects stay maps)
//!
//! # Design
//!
//! Codecs are marker structs with static methods. [`WireCodec`] selects one
//! at channel construction time.
//!
//! # Example
//!
//! ```
//! use progwire::codec::WireCodec;
//! use serde_json::json;
//!
//! let message = json!({ "_pu": "abc", "_b": "halfway" });
//! for codec in [WireCodec::Json, WireCodec::MsgPack] {
//!     let bytes = codec.encode(&message).unwrap();
//!     assert_eq!(codec.decode(&bytes).unwrap(), message);
//! }
//! ```

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;

use serde_json::Value;

use crate::error::Result;

/// Codec used by a channel for every frame it sends and receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireCodec {
    /// JSON text (default).
    #[default]
    Json,
    /// MessagePack binary.
    MsgPack,
}

impl WireCodec {
    /// Encode a wire message.
    pub fn encode<T: serde::Serialize>(&self, message: &T) -> Result<Vec<u8>> {
        match self {
            WireCodec::Json => JsonCodec::encode(message),
            WireCodec::MsgPack => MsgPackCodec::encode(message),
        }
    }

    /// Decode a wire message.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        match self {
            WireCodec::Json => JsonCodec::decode(bytes),
            WireCodec::MsgPack => MsgPackCodec::decode(bytes),
        }
    }
}
