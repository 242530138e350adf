//! MsgPack codec using `rmp-serde`.
//!
//! **CRITICAL**: Always use `to_vec_named`, NEVER `to_vec`!
//! Tag keys (`_rq`, `_pu`, ...) only survive when structs serialize as maps.
//!
//! # Example
//!
//! ```
//! use progwire::codec::MsgPackCodec;
//! use serde_json::{json, Value};
//!
//! let message = json!({ "_rq": "42", "_b": [1, 2, 3] });
//! let encoded = MsgPackCodec::encode(&message).unwrap();
//! let decoded: Value = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, message);
//! ```

use crate::error::Result;

/// MessagePack codec for wire messages.
///
/// Uses `rmp_serde::to_vec_named` so that structs are serialized as maps
/// (with field names) rather than arrays (positional).
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        // CRITICAL: to_vec_named, NOT to_vec!
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
