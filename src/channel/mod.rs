//! The progress-aware channel.
//!
//! A [`Channel`] wraps a [`Transport`] and adds request/response
//! correlation with progress updates on top of plain messages:
//!
//! ```text
//! inbound frame ──► decode ──► classify ─┬─ progress  ──► progress registry
//!                                        ├─ response  ──► correlation store
//!                                        └─ request / plain ──► router or handler
//! ```
//!
//! Progress-tagged messages never reach the message handler. When a
//! request settles its progress handler is removed before the completion
//! runs.
//!
//! # Example
//!
//! ```
//! use progwire::{Channel, InboundMessage, Responder};
//! use progwire::transport::MemoryTransport;
//! use serde_json::json;
//!
//! let transport = MemoryTransport::new();
//! let channel = Channel::builder()
//!     .on_message(|msg: InboundMessage, res: Responder| {
//!         res.send_progress_update(json!("working"))?;
//!         res.respond(msg.into_body())
//!     })
//!     .build(transport.clone());
//!
//! channel.handle_message(json!({ "_rq": "1", "_b": "ping" })).unwrap();
//! assert_eq!(transport.last_sent_json(), Some(json!({ "_rs": "1", "_b": "ping" })));
//! ```

mod builder;
mod handler;
mod request;

pub use builder::{ChannelBuilder, ChannelConfig};
pub use handler::{HandlerResult, InboundMessage, MessageHandler};
pub use request::RequestBuilder;

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::correlation::{CorrelationStore, IdGenerator};
use crate::error::{ChannelError, Result};
use crate::progress::{send_progress_update, ProgressRegistry};
use crate::protocol::{classify, FrameBuffer, WireMessage};
use crate::responder::{Responder, ResponderChain};
use crate::router::{RouteRequest, Router};
use crate::transport::Outbound;

/// Size of the buffer used by [`Channel::run`] for each read.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Handle to a progress-aware request/response channel.
///
/// Cheaply cloneable; clones share the same registry, store and transport.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

struct Inner {
    config: ChannelConfig,
    outbound: Outbound,
    registry: Arc<ProgressRegistry>,
    store: Arc<dyn CorrelationStore>,
    ids: Arc<dyn IdGenerator>,
    responders: ResponderChain,
    handler: Option<Arc<dyn MessageHandler>>,
    router: Option<Router>,
}

impl Channel {
    /// Create a new channel builder.
    pub fn builder() -> ChannelBuilder {
        ChannelBuilder::new()
    }

    /// Channel settings.
    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// Send an ordinary, uncorrelated message.
    pub fn send(&self, body: Value) -> Result<()> {
        self.inner.outbound.send(&WireMessage::Plain(body))
    }

    /// Send a progress update for request `id`.
    ///
    /// # Errors
    ///
    /// [`ChannelError::ProgressDisabled`] when the channel was built without
    /// progress updates, otherwise the transport's send error.
    pub fn send_progress_update(&self, id: &str, body: Value) -> Result<()> {
        if !self.inner.config.progress_updates {
            return Err(ChannelError::ProgressDisabled);
        }
        let outbound = &self.inner.outbound;
        send_progress_update(outbound.transport(), outbound.codec(), id, body)
    }

    /// Start a correlated request carrying `body`.
    pub fn request(&self, body: Value) -> RequestBuilder {
        RequestBuilder::new(self.clone(), body)
    }

    /// Decode and handle one inbound message.
    pub fn handle_frame(&self, payload: &[u8]) -> Result<()> {
        let value = self.inner.config.codec.decode(payload)?;
        self.handle_message(value)
    }

    /// Classify and handle one decoded inbound message.
    ///
    /// # Errors
    ///
    /// Protocol errors from classification, and errors returned by the
    /// progress handler or message handler that received the message.
    pub fn handle_message(&self, value: Value) -> Result<()> {
        match classify(value)? {
            WireMessage::Progress { id, body } if self.inner.config.progress_updates => {
                if !self.inner.registry.dispatch(&id, body)? {
                    tracing::trace!("No progress handler for {}", id);
                }
                Ok(())
            }
            message @ WireMessage::Progress { .. } => {
                // Without progress support the tag carries no meaning
                let value = serde_json::to_value(&message)?;
                self.dispatch_inbound(None, value)
            }
            WireMessage::Response { id, body } => {
                if !self.inner.store.resolve(&id, body) {
                    tracing::debug!("Dropping response for unknown request {}", id);
                }
                Ok(())
            }
            WireMessage::ErrorResponse { id, error } => {
                if !self.inner.store.reject(&id, ChannelError::Rejected(error)) {
                    tracing::debug!("Dropping error response for unknown request {}", id);
                }
                Ok(())
            }
            WireMessage::Request { id, body } => self.dispatch_inbound(Some(id), body),
            WireMessage::Plain(body) => self.dispatch_inbound(None, body),
        }
    }

    /// Read length-prefixed frames from `reader` until EOF.
    ///
    /// Errors from individual messages are logged and the loop continues.
    /// Read errors and oversized frames end the loop. Either way every
    /// pending request is rejected with [`ChannelError::ConnectionClosed`]
    /// once the loop stops.
    pub async fn run<R: AsyncRead + Unpin>(&self, reader: R) -> Result<()> {
        let result = self.read_loop(reader).await;
        if let Err(e) = &result {
            tracing::error!("Read loop error: {}", e);
        }
        self.close();
        result
    }

    async fn read_loop<R: AsyncRead + Unpin>(&self, mut reader: R) -> Result<()> {
        let mut frame_buffer = FrameBuffer::with_max_message_size(self.inner.config.max_message_size);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => return Ok(()), // Connection closed
                Ok(n) => n,
                Err(e) => return Err(ChannelError::Io(e)),
            };

            for payload in frame_buffer.push(&buf[..n])? {
                if let Err(e) = self.handle_frame(&payload) {
                    match e {
                        ChannelError::Json(_)
                        | ChannelError::MsgPackDecode(_)
                        | ChannelError::Protocol(_) => {
                            tracing::warn!("Dropping undecodable frame: {}", e)
                        }
                        _ => tracing::error!("Inbound message failed: {}", e),
                    }
                }
            }
        }
    }

    /// Reject every pending request with [`ChannelError::ConnectionClosed`].
    pub fn close(&self) {
        let pending = self.inner.store.pending_ids();
        if !pending.is_empty() {
            tracing::debug!("Closing channel with {} pending requests", pending.len());
        }
        for id in pending {
            self.inner.store.reject(&id, ChannelError::ConnectionClosed);
        }
    }

    /// Ids of requests still waiting for a response.
    pub fn pending_requests(&self) -> Vec<String> {
        self.inner.store.pending_ids()
    }

    /// Check whether request `id` has a progress handler attached.
    pub fn has_progress_handler(&self, id: &str) -> bool {
        self.inner.registry.contains(id)
    }

    /// Number of attached progress handlers.
    pub fn progress_handlers(&self) -> usize {
        self.inner.registry.len()
    }

    pub(crate) fn outbound(&self) -> &Outbound {
        &self.inner.outbound
    }

    pub(crate) fn registry(&self) -> &Arc<ProgressRegistry> {
        &self.inner.registry
    }

    pub(crate) fn store(&self) -> &Arc<dyn CorrelationStore> {
        &self.inner.store
    }

    pub(crate) fn next_id(&self) -> String {
        self.inner.ids.generate()
    }

    fn dispatch_inbound(&self, request_id: Option<String>, body: Value) -> Result<()> {
        let responder = self
            .inner
            .responders
            .build(Responder::new(request_id.clone(), self.inner.outbound.clone()));

        if let Some(router) = &self.inner.router {
            if let Some(route) = RouteRequest::parse(&body, request_id.clone()) {
                return router.dispatch(route, responder);
            }
        }

        match &self.inner.handler {
            Some(handler) => handler.call(InboundMessage::new(request_id, body), responder),
            None => {
                tracing::debug!("No message handler, dropping inbound message");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("config", &self.inner.config)
            .field("pending_requests", &self.inner.store.pending_ids().len())
            .field("progress_handlers", &self.inner.registry.len())
            .finish()
    }
}
