//! Awaitable response of an async-mode request.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{ChannelError, Result};

/// Response of a request issued with [`RequestBuilder::send`].
///
/// Resolves to the response body, or to the error the request was rejected
/// with. If the channel goes away before the request settles it resolves to
/// [`ChannelError::ConnectionClosed`].
///
/// [`RequestBuilder::send`]: crate::channel::RequestBuilder::send
#[derive(Debug)]
pub struct PendingResponse {
    id: String,
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingResponse {
    pub(crate) fn new(id: String, rx: oneshot::Receiver<Result<Value>>) -> Self {
        Self { id, rx }
    }

    /// Correlation id of the request.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(ChannelError::ConnectionClosed)))
    }
}
