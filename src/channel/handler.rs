//! Inbound message handlers.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::responder::Responder;

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// A request or plain message delivered to the message handler.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    request_id: Option<String>,
    body: Value,
}

impl InboundMessage {
    pub(crate) fn new(request_id: Option<String>, body: Value) -> Self {
        Self { request_id, body }
    }

    /// Whether the sender waits for a response.
    #[inline]
    pub fn is_request(&self) -> bool {
        self.request_id.is_some()
    }

    /// Correlation id of the request.
    #[inline]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// The message body.
    #[inline]
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Take the body.
    pub fn into_body(self) -> Value {
        self.body
    }

    /// Deserialize the body into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.body)?)
    }
}

/// Trait for inbound message handlers.
///
/// Handlers run inline on the read loop, in arrival order. Anything slow
/// should be moved to a task together with a clone of the responder.
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one inbound message.
    fn call(&self, message: InboundMessage, responder: Responder) -> HandlerResult;
}

impl<F> MessageHandler for F
where
    F: Fn(InboundMessage, Responder) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, message: InboundMessage, responder: Responder) -> HandlerResult {
        self(message, responder)
    }
}
