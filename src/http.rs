//! HTTP-style requests over a channel.
//!
//! `channel.get(url)` and friends build a routed request
//! `{ _m: method, _u: url, _b: body }` and translate the `{ _s, _b }` reply
//! into an [`HttpResponse`]. Error replies fail with
//! [`ChannelError::Status`].
//!
//! # Example
//!
//! ```no_run
//! # async fn demo(channel: progwire::Channel) -> progwire::Result<()> {
//! use serde_json::{json, Value};
//!
//! let dispatch = channel
//!     .post("/jobs")
//!     .body(json!({ "size": 3 }))
//!     .on_progress_update(|update: Value| println!("progress: {}", update))
//!     .send()?;
//!
//! if let Some(pending) = dispatch.into_pending() {
//!     let response = pending.await?;
//!     println!("{} {}", response.status, response.body);
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::{json, Value};

use crate::channel::Channel;
use crate::correlation::PendingResponse;
use crate::error::{ChannelError, Result};
use crate::progress::ProgressHandler;
use crate::protocol::keys;

/// Reply to an HTTP-style request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code (`_s`).
    pub status: u16,
    /// Reply body (`_b`), `null` when absent.
    pub body: Value,
}

impl HttpResponse {
    /// Read `{ _s, _b }` out of a reply.
    ///
    /// Returns `None` unless `_s` is present and fits a `u16`.
    pub fn from_wire(value: &Value) -> Option<Self> {
        let status = value.get(keys::STATUS)?.as_u64()?;
        Some(Self {
            status: u16::try_from(status).ok()?,
            body: value.get(keys::BODY).cloned().unwrap_or(Value::Null),
        })
    }

    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn translate(result: Result<Value>) -> Result<HttpResponse> {
    match result {
        Ok(reply) => HttpResponse::from_wire(&reply).ok_or_else(|| {
            ChannelError::Protocol(format!("reply without a status: {}", reply))
        }),
        Err(ChannelError::Rejected(reply)) => Err(match HttpResponse::from_wire(&reply) {
            Some(response) => ChannelError::Status(response),
            None => ChannelError::Rejected(reply),
        }),
        Err(e) => Err(e),
    }
}

/// Outcome of [`HttpRequest::send`].
#[derive(Debug)]
#[must_use]
pub enum HttpDispatch {
    /// The request went out without expecting a reply.
    Sent,
    /// The reply is pending.
    Pending(PendingHttpResponse),
}

impl HttpDispatch {
    /// The pending reply, if one is expected.
    pub fn into_pending(self) -> Option<PendingHttpResponse> {
        match self {
            HttpDispatch::Sent => None,
            HttpDispatch::Pending(pending) => Some(pending),
        }
    }
}

/// Future resolving to the [`HttpResponse`] of a request.
#[derive(Debug)]
pub struct PendingHttpResponse {
    inner: PendingResponse,
}

impl PendingHttpResponse {
    /// Correlation id of the request.
    pub fn id(&self) -> &str {
        self.inner.id()
    }
}

impl Future for PendingHttpResponse {
    type Output = Result<HttpResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(translate)
    }
}

/// Builder for an HTTP-style request, created by [`Channel::http`].
#[must_use = "requests do nothing until sent"]
pub struct HttpRequest {
    channel: Channel,
    method: String,
    url: String,
    body: Value,
    timeout: Option<Duration>,
    expect_response: bool,
    progress: Option<Arc<dyn ProgressHandler>>,
}

impl HttpRequest {
    fn new(channel: Channel, method: &str, url: &str) -> Self {
        Self {
            channel,
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            body: Value::Null,
            timeout: None,
            expect_response: true,
            progress: None,
        }
    }

    /// Set the request body.
    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Fail if no reply arrives within `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether to wait for a reply.
    ///
    /// When `false` the request is sent as a plain message and no reply is
    /// correlated. Default: `true`
    pub fn expect_response(mut self, expect: bool) -> Self {
        self.expect_response = expect;
        self
    }

    /// Receive progress updates while waiting for the reply.
    pub fn on_progress_update<H: ProgressHandler>(mut self, handler: H) -> Self {
        self.progress = Some(Arc::new(handler));
        self
    }

    fn wire_body(&self) -> Value {
        json!({
            (keys::METHOD): self.method,
            (keys::URL): self.url,
            (keys::BODY): self.body,
        })
    }

    /// Send the request.
    ///
    /// # Errors
    ///
    /// Configuration errors as for [`RequestBuilder::send`], or the send
    /// error when no reply is expected.
    ///
    /// [`RequestBuilder::send`]: crate::channel::RequestBuilder::send
    pub fn send(self) -> Result<HttpDispatch> {
        let wire = self.wire_body();
        if !self.expect_response {
            self.channel.send(wire)?;
            return Ok(HttpDispatch::Sent);
        }

        let inner = self
            .channel
            .request(wire)
            .with_timeout(self.timeout)
            .with_progress(self.progress)
            .send()?;
        Ok(HttpDispatch::Pending(PendingHttpResponse { inner }))
    }

    /// Send the request; `callback` receives the translated reply.
    ///
    /// Returns the correlation id, or `None` when no reply is expected (the
    /// callback is then dropped without being called).
    pub fn send_with_callback<F>(self, callback: F) -> Result<Option<String>>
    where
        F: FnOnce(Result<HttpResponse>) + Send + 'static,
    {
        let wire = self.wire_body();
        if !self.expect_response {
            self.channel.send(wire)?;
            return Ok(None);
        }

        let id = self
            .channel
            .request(wire)
            .with_timeout(self.timeout)
            .with_progress(self.progress)
            .send_with_callback(move |result| callback(translate(result)))?;
        Ok(Some(id))
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("expect_response", &self.expect_response)
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

impl Channel {
    /// Start an HTTP-style request.
    pub fn http(&self, method: &str, url: &str) -> HttpRequest {
        HttpRequest::new(self.clone(), method, url)
    }

    /// Start a `GET` request.
    pub fn get(&self, url: &str) -> HttpRequest {
        self.http("GET", url)
    }

    /// Start a `POST` request.
    pub fn post(&self, url: &str) -> HttpRequest {
        self.http("POST", url)
    }

    /// Start a `PUT` request.
    pub fn put(&self, url: &str) -> HttpRequest {
        self.http("PUT", url)
    }

    /// Start a `DELETE` request.
    pub fn delete(&self, url: &str) -> HttpRequest {
        self.http("DELETE", url)
    }

    /// Start a `PATCH` request.
    pub fn patch(&self, url: &str) -> HttpRequest {
        self.http("PATCH", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::SequentialIdGenerator;
    use crate::transport::MemoryTransport;
    use std::sync::Mutex;

    fn channel() -> (Channel, MemoryTransport) {
        let transport = MemoryTransport::new();
        let channel = Channel::builder()
            .id_generator(SequentialIdGenerator::new("h"))
            .build(transport.clone());
        (channel, transport)
    }

    #[test]
    fn test_from_wire() {
        let response = HttpResponse::from_wire(&json!({ "_s": 201, "_b": "made" })).unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.body, json!("made"));
        assert!(response.is_success());

        assert!(HttpResponse::from_wire(&json!({ "_b": "no status" })).is_none());
        assert!(HttpResponse::from_wire(&json!({ "_s": 70000 })).is_none());
        assert_eq!(
            HttpResponse::from_wire(&json!({ "_s": 204 })).unwrap().body,
            Value::Null
        );
    }

    #[test]
    fn test_send_without_response_sends_bare_object() {
        let (channel, transport) = channel();

        let dispatch = channel
            .post("/log")
            .body(json!("line"))
            .expect_response(false)
            .send()
            .unwrap();

        assert!(matches!(dispatch, HttpDispatch::Sent));
        assert_eq!(
            transport.last_sent_json(),
            Some(json!({ "_m": "POST", "_u": "/log", "_b": "line" }))
        );
        assert!(channel.pending_requests().is_empty());
    }

    #[tokio::test]
    async fn test_success_translation() {
        let (channel, transport) = channel();

        let pending = channel.get("/status").send().unwrap().into_pending().unwrap();
        assert_eq!(
            transport.last_sent_json(),
            Some(json!({ "_rq": "h1", "_b": { "_m": "GET", "_u": "/status", "_b": null } }))
        );

        channel
            .handle_message(json!({ "_rs": "h1", "_b": { "_s": 200, "_b": { "up": true } } }))
            .unwrap();

        let response = pending.await.unwrap();
        assert_eq!(
            response,
            HttpResponse {
                status: 200,
                body: json!({ "up": true })
            }
        );
    }

    #[tokio::test]
    async fn test_error_translation() {
        let (channel, _transport) = channel();

        let pending = channel.delete("/x").send().unwrap().into_pending().unwrap();
        channel
            .handle_message(json!({ "_rs": "h1", "_e": { "_s": 404, "_b": "Not Found" } }))
            .unwrap();

        match pending.await {
            Err(ChannelError::Status(response)) => {
                assert_eq!(response.status, 404);
                assert_eq!(response.body, json!("Not Found"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_untyped_error_stays_rejected() {
        let (channel, _transport) = channel();

        let pending = channel.get("/x").send().unwrap().into_pending().unwrap();
        channel
            .handle_message(json!({ "_rs": "h1", "_e": "plain failure" }))
            .unwrap();

        assert!(matches!(pending.await, Err(ChannelError::Rejected(_))));
    }

    #[test]
    fn test_progress_in_callback_mode() {
        let (channel, _transport) = channel();
        let updates = Arc::new(Mutex::new(Vec::new()));
        let result = Arc::new(Mutex::new(None));
        let update_sink = updates.clone();
        let result_sink = result.clone();

        let id = channel
            .put("/jobs/1")
            .on_progress_update(move |body: Value| update_sink.lock().unwrap().push(body))
            .send_with_callback(move |r| *result_sink.lock().unwrap() = Some(r))
            .unwrap()
            .unwrap();

        channel
            .handle_message(json!({ "_pu": id, "_b": "Yup" }))
            .unwrap();
        channel
            .handle_message(json!({ "_rs": id, "_b": { "_s": 200, "_b": "done" } }))
            .unwrap();

        assert_eq!(*updates.lock().unwrap(), vec![json!("Yup")]);
        let response = result.lock().unwrap().take().unwrap().unwrap();
        assert_eq!(response.body, json!("done"));
        assert_eq!(channel.progress_handlers(), 0);
    }

    #[test]
    fn test_callback_without_response_is_not_called() {
        let (channel, transport) = channel();

        let id = channel
            .patch("/fire")
            .expect_response(false)
            .send_with_callback(|_| panic!("no reply expected"))
            .unwrap();

        assert_eq!(id, None);
        assert_eq!(transport.sent_count(), 1);
    }
}
