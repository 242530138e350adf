//! Message classification.
//!
//! Tags are checked in a fixed priority order: progress first, then
//! response, then request. A message carrying the progress tag is never
//! interpreted as anything else. A tag whose value is `null` counts as
//! absent.

use serde_json::{Map, Value};

use super::message::{keys, WireMessage};
use crate::error::{ChannelError, Result};

/// Classify a decoded inbound message.
///
/// Non-object values and objects without tags are [`WireMessage::Plain`].
///
/// # Errors
///
/// Returns [`ChannelError::Protocol`] when a tag is present but its
/// correlation id is not a string.
pub fn classify(value: Value) -> Result<WireMessage> {
    let mut object = match value {
        Value::Object(object) => object,
        other => return Ok(WireMessage::Plain(other)),
    };

    if has_tag(&object, keys::PROGRESS_FOR) {
        let id = take_id(&mut object, keys::PROGRESS_FOR)?;
        let body = take_or_null(&mut object, keys::BODY);
        return Ok(WireMessage::Progress { id, body });
    }

    if has_tag(&object, keys::RESPONSE_TO) {
        let id = take_id(&mut object, keys::RESPONSE_TO)?;
        if let Some(error) = object.remove(keys::ERROR) {
            return Ok(WireMessage::ErrorResponse { id, error });
        }
        let body = take_or_null(&mut object, keys::BODY);
        return Ok(WireMessage::Response { id, body });
    }

    if has_tag(&object, keys::REQUEST_ID) {
        let id = take_id(&mut object, keys::REQUEST_ID)?;
        let body = take_or_null(&mut object, keys::BODY);
        return Ok(WireMessage::Request { id, body });
    }

    Ok(WireMessage::Plain(Value::Object(object)))
}

fn has_tag(object: &Map<String, Value>, key: &str) -> bool {
    object.get(key).is_some_and(|value| !value.is_null())
}

fn take_id(object: &mut Map<String, Value>, key: &str) -> Result<String> {
    match object.remove(key) {
        Some(Value::String(id)) => Ok(id),
        Some(other) => Err(ChannelError::Protocol(format!(
            "{} must be a string, got {}",
            key, other
        ))),
        None => Err(ChannelError::Protocol(format!("missing {}", key))),
    }
}

fn take_or_null(object: &mut Map<String, Value>, key: &str) -> Value {
    object.remove(key).unwrap_or(Value::Null)
}
