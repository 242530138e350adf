//! JSON codec using `serde_json`.

use crate::error::Result;

/// JSON codec for wire messages.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to JSON bytes.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    /// Decode JSON bytes to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_encode_keeps_field_order_of_struct() {
        #[derive(serde::Serialize)]
        struct Tagged {
            #[serde(rename = "_pu")]
            id: &'static str,
            #[serde(rename = "_b")]
            body: Value,
        }

        let message = Tagged {
            id: "someId",
            body: json!({ "hello": "world" }),
        };
        let encoded = JsonCodec::encode(&message).unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            r#"{"_pu":"someId","_b":{"hello":"world"}}"#
        );
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<Value> = JsonCodec::decode(b"{not json");
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_scalar_message() {
        let decoded: Value = JsonCodec::decode(b"\"just a string\"").unwrap();
        assert_eq!(decoded, json!("just a string"));
    }
}
