//! Responders handed to inbound message handlers.
//!
//! A [`Responder`] represents the capability to answer one inbound message:
//! - `respond` - send the response body
//! - `error` - send an error response
//! - `send_progress_update` - push a progress notification while the
//!   requester is still waiting
//!
//! Responders are built once per inbound message by running the base
//! responder through the channel's [`ResponderChain`]: user layers in the
//! order they were added, then the progress layer.
//!
//! # Example
//!
//! ```ignore
//! channel_builder.on_message(|msg: InboundMessage, res: Responder| {
//!     res.send_progress_update(json!({ "percent": 50 }))?
//!        .send_progress_update(json!({ "percent": 100 }))?;
//!     res.respond(json!("done"))
//! });
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::error::{ChannelError, Result};
use crate::progress::send_progress_update;
use crate::protocol::WireMessage;
use crate::transport::Outbound;

/// What `send_progress_update` does for this responder.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProgressCapability {
    /// The progress layer is not installed.
    Unavailable,
    /// Send progress tagged with the request id.
    Live(String),
    /// No request id: nothing to correlate with, calls do nothing.
    NoOp,
}

/// Capability to answer one inbound message.
///
/// `Clone` so that handlers can move it into their own tasks.
#[derive(Clone)]
pub struct Responder {
    /// Correlation id of the inbound request (None for plain messages).
    request_id: Option<String>,
    /// Where replies go.
    outbound: Outbound,
    /// Progress behaviour installed by the layer chain.
    progress: ProgressCapability,
}

impl Responder {
    pub(crate) fn new(request_id: Option<String>, outbound: Outbound) -> Self {
        Self {
            request_id,
            outbound,
            progress: ProgressCapability::Unavailable,
        }
    }

    /// Correlation id of the inbound request.
    #[inline]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Whether the inbound message expects a response.
    #[inline]
    pub fn is_request(&self) -> bool {
        self.request_id.is_some()
    }

    /// Send the response body.
    ///
    /// Does nothing for plain messages.
    pub fn respond(&self, body: Value) -> Result<()> {
        match &self.request_id {
            Some(id) => self.outbound.send(&WireMessage::Response {
                id: id.clone(),
                body,
            }),
            None => {
                tracing::debug!("Dropping response to a message that expects none");
                Ok(())
            }
        }
    }

    /// Send an error response.
    ///
    /// Does nothing for plain messages.
    pub fn error(&self, error: Value) -> Result<()> {
        match &self.request_id {
            Some(id) => self.outbound.send(&WireMessage::ErrorResponse {
                id: id.clone(),
                error,
            }),
            None => {
                tracing::debug!("Dropping error response to a message that expects none");
                Ok(())
            }
        }
    }

    /// Push a progress update to the requester.
    ///
    /// For plain messages nothing is sent. Both cases return the responder
    /// so calls can be chained.
    ///
    /// # Errors
    ///
    /// The transport's send error, or [`ChannelError::ProgressDisabled`]
    /// when the channel was built without progress updates.
    pub fn send_progress_update(&self, body: Value) -> Result<&Self> {
        match &self.progress {
            ProgressCapability::Live(id) => {
                send_progress_update(self.outbound.transport(), self.outbound.codec(), id, body)?;
                Ok(self)
            }
            ProgressCapability::NoOp => Ok(self),
            ProgressCapability::Unavailable => Err(ChannelError::ProgressDisabled),
        }
    }

    /// Install progress support, live when there is a request id.
    fn with_progress(mut self) -> Self {
        self.progress = match &self.request_id {
            Some(id) => ProgressCapability::Live(id.clone()),
            None => ProgressCapability::NoOp,
        };
        self
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("request_id", &self.request_id)
            .field("progress", &self.progress)
            .finish()
    }
}

/// One step of responder construction.
pub trait ResponderLayer: Send + Sync + 'static {
    /// Decorate a responder built by the previous layers.
    fn layer(&self, responder: Responder) -> Responder;
}

impl<F> ResponderLayer for F
where
    F: Fn(Responder) -> Responder + Send + Sync + 'static,
{
    fn layer(&self, responder: Responder) -> Responder {
        self(responder)
    }
}

/// Layer that installs `send_progress_update`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressLayer;

impl ResponderLayer for ProgressLayer {
    fn layer(&self, responder: Responder) -> Responder {
        responder.with_progress()
    }
}

/// Ordered responder layers, fixed when the channel is built.
#[derive(Clone, Default)]
pub struct ResponderChain {
    layers: Vec<Arc<dyn ResponderLayer>>,
}

impl ResponderChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer; it runs after the layers already added.
    pub fn push(&mut self, layer: Arc<dyn ResponderLayer>) {
        self.layers.push(layer);
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if there are no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run `base` through every layer in order.
    pub fn build(&self, base: Responder) -> Responder {
        self.layers
            .iter()
            .fold(base, |responder, layer| layer.layer(responder))
    }
}
