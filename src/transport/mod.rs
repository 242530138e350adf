//! Transport module - where encoded messages go.
//!
//! The channel hands every encoded message to a [`Transport`]:
//! - [`MemoryTransport`] - records frames in memory (tests, loopback)
//! - [`StreamTransport`] - dedicated writer task over any `AsyncWrite`

mod memory;
mod stream;

pub use memory::MemoryTransport;
pub use stream::{
    spawn_stream_transport, StreamTransport, StreamTransportConfig, DEFAULT_CHANNEL_CAPACITY,
};

use std::sync::Arc;

use bytes::Bytes;

use crate::codec::WireCodec;
use crate::error::Result;
use crate::protocol::WireMessage;

/// Send primitive consumed by the channel.
///
/// `send` must not block: it queues or delivers one encoded message and
/// reports whether that worked.
pub trait Transport: Send + Sync + 'static {
    /// Deliver one encoded message.
    fn send(&self, message: Bytes) -> Result<()>;
}

/// Transport paired with the codec that encodes for it.
#[derive(Clone)]
pub(crate) struct Outbound {
    transport: Arc<dyn Transport>,
    codec: WireCodec,
}

impl Outbound {
    pub(crate) fn new(transport: Arc<dyn Transport>, codec: WireCodec) -> Self {
        Self { transport, codec }
    }

    /// Encode and send one message.
    pub(crate) fn send(&self, message: &WireMessage) -> Result<()> {
        let encoded = self.codec.encode(message)?;
        self.transport.send(Bytes::from(encoded))
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn codec(&self) -> WireCodec {
        self.codec
    }
}
