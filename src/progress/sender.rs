//! Outbound progress notifications.

use bytes::Bytes;
use serde_json::Value;

use crate::codec::WireCodec;
use crate::error::Result;
use crate::protocol::WireMessage;
use crate::transport::Transport;

/// Send `{ _pu: id, _b: body }` over `transport`.
///
/// Fire-and-forget: there is no acknowledgement, the result is the
/// transport's send result.
pub fn send_progress_update(
    transport: &dyn Transport,
    codec: WireCodec,
    id: &str,
    body: Value,
) -> Result<()> {
    let message = WireMessage::Progress {
        id: id.to_string(),
        body,
    };
    let encoded = codec.encode(&message)?;
    tracing::trace!("Sending progress update for {}", id);
    transport.send(Bytes::from(encoded))
}
