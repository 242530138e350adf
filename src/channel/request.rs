//! Correlated requests.
//!
//! A request goes out as `{ _rq: id, _b: body }` and settles on the first of:
//! a `_rs` response for the id, the timeout, a failed send, or channel
//! close. Before sending, in this order: the progress handler is
//! registered, completion interest is registered, the timeout is armed.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use super::Channel;
use crate::correlation::{CorrelationStore, PendingResponse};
use crate::error::{ChannelError, Result};
use crate::progress::{ProgressHandler, TypedProgressHandler};
use crate::protocol::WireMessage;

/// Builder for one correlated request, created by [`Channel::request`].
///
/// Finish with [`send`](Self::send) to await the response, or with
/// [`send_with_callback`](Self::send_with_callback) to receive it in a
/// callback.
#[must_use = "requests do nothing until sent"]
pub struct RequestBuilder {
    channel: Channel,
    body: Value,
    timeout: Option<Duration>,
    progress: Option<Arc<dyn ProgressHandler>>,
}

impl RequestBuilder {
    pub(crate) fn new(channel: Channel, body: Value) -> Self {
        Self {
            channel,
            body,
            timeout: None,
            progress: None,
        }
    }

    /// Fail the request if no response arrives within `timeout`.
    ///
    /// Progress updates do not extend the deadline. `Duration::ZERO`
    /// disables the timeout, including the channel's default one.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Receive progress updates sent by the peer while it works.
    pub fn on_progress<H: ProgressHandler>(mut self, handler: H) -> Self {
        self.progress = Some(Arc::new(handler));
        self
    }

    /// Like [`on_progress`](Self::on_progress), deserializing each update
    /// into `T` first.
    pub fn on_progress_typed<T, F>(self, handler: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on_progress(TypedProgressHandler::new(handler))
    }

    pub(crate) fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn with_progress(mut self, progress: Option<Arc<dyn ProgressHandler>>) -> Self {
        self.progress = progress;
        self
    }

    /// Send the request and return a future for its response.
    ///
    /// # Errors
    ///
    /// Fails before anything is registered or sent with
    /// [`ChannelError::NoCompletionPath`] when the channel was built with
    /// async results disabled, [`ChannelError::ProgressDisabled`] for a
    /// progress handler on a channel without progress support, and
    /// [`ChannelError::NoRuntime`] for a timeout outside a Tokio runtime.
    /// Everything after that, send failures included, arrives through the
    /// returned [`PendingResponse`].
    pub fn send(self) -> Result<PendingResponse> {
        if !self.channel.config().async_results {
            return Err(ChannelError::NoCompletionPath);
        }

        let (tx, rx) = oneshot::channel();
        let id = self.issue(move |store, id| store.add_waiter(id, tx))?;
        Ok(PendingResponse::new(id, rx))
    }

    /// Send the request; `callback` receives the response or error.
    ///
    /// Works whether or not async results are enabled. Returns the
    /// correlation id.
    ///
    /// # Errors
    ///
    /// The same configuration errors as [`send`](Self::send), except
    /// `NoCompletionPath`. The callback is not called in that case.
    pub fn send_with_callback<F>(self, callback: F) -> Result<String>
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        self.issue(move |store, id| store.add_callback(id, Box::new(callback)))
    }

    fn issue<R>(self, register: R) -> Result<String>
    where
        R: FnOnce(&dyn CorrelationStore, &str),
    {
        let config = self.channel.config();
        if self.progress.is_some() && !config.progress_updates {
            return Err(ChannelError::ProgressDisabled);
        }

        // A zero timeout means no timeout
        let timeout = self
            .timeout
            .or(config.default_timeout)
            .filter(|d| !d.is_zero());
        let runtime = match timeout {
            Some(_) => Some(Handle::try_current().map_err(|_| ChannelError::NoRuntime)?),
            None => None,
        };

        let id = self.channel.next_id();
        let store = self.channel.store().clone();

        if let Some(handler) = self.progress {
            self.channel.registry().register_shared(&id, handler);
        }
        register(store.as_ref(), &id);

        if let (Some(duration), Some(runtime)) = (timeout, runtime) {
            let timer_store = store.clone();
            let timer_id = id.clone();
            let timer = runtime.spawn(async move {
                tokio::time::sleep(duration).await;
                let error = ChannelError::Timeout {
                    millis: duration.as_millis(),
                };
                if timer_store.reject(&timer_id, error) {
                    tracing::debug!("Request {} timed out after {:?}", timer_id, duration);
                }
            });
            store.attach_timer(&id, timer.abort_handle());
        }

        tracing::debug!("Sending request {}", id);
        let message = WireMessage::Request {
            id: id.clone(),
            body: self.body,
        };
        if let Err(e) = self.channel.outbound().send(&message) {
            tracing::debug!("Request {} failed to send: {}", id, e);
            store.reject(&id, e);
        }

        Ok(id)
    }
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::SequentialIdGenerator;
    use crate::transport::MemoryTransport;
    use serde_json::json;
    use std::sync::Mutex;

    fn channel(builder: crate::channel::ChannelBuilder) -> (Channel, MemoryTransport) {
        let transport = MemoryTransport::new();
        let channel = builder
            .id_generator(SequentialIdGenerator::new("req-"))
            .build(transport.clone());
        (channel, transport)
    }

    #[tokio::test]
    async fn test_request_resolves_with_response() {
        let (channel, transport) = channel(Channel::builder());

        let pending = channel.request(json!({ "hello": "world" })).send().unwrap();
        assert_eq!(pending.id(), "req-1");
        assert_eq!(
            transport.last_sent_json(),
            Some(json!({ "_rq": "req-1", "_b": { "hello": "world" } }))
        );

        channel
            .handle_message(json!({ "_rs": "req-1", "_b": "done" }))
            .unwrap();
        assert_eq!(pending.await.unwrap(), json!("done"));
        assert!(channel.pending_requests().is_empty());
    }

    #[tokio::test]
    async fn test_error_response_rejects() {
        let (channel, _transport) = channel(Channel::builder());

        let pending = channel.request(json!(null)).send().unwrap();
        channel
            .handle_message(json!({ "_rs": "req-1", "_e": { "code": 7 } }))
            .unwrap();

        match pending.await {
            Err(ChannelError::Rejected(body)) => assert_eq!(body, json!({ "code": 7 })),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_message() {
        let (channel, _transport) = channel(Channel::builder());

        let pending = channel
            .request(json!(null))
            .timeout(Duration::from_millis(10))
            .send()
            .unwrap();

        let err = pending.await.unwrap_err();
        assert_eq!(err.to_string(), "Timed out after 10 ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_timeout_applies() {
        let (channel, _transport) =
            channel(Channel::builder().default_timeout(Duration::from_millis(25)));

        let pending = channel.request(json!(null)).send().unwrap();
        assert!(matches!(
            pending.await,
            Err(ChannelError::Timeout { millis: 25 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_never_fires() {
        let (channel, _transport) =
            channel(Channel::builder().default_timeout(Duration::ZERO));

        let pending = channel
            .request(json!(null))
            .timeout(Duration::ZERO)
            .send()
            .unwrap();
        let defaulted = channel.request(json!(null)).send().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(channel.pending_requests().len(), 2);

        channel
            .handle_message(json!({ "_rs": "req-1", "_b": "late ok" }))
            .unwrap();
        channel
            .handle_message(json!({ "_rs": "req-2", "_b": "also ok" }))
            .unwrap();
        assert_eq!(pending.await.unwrap(), json!("late ok"));
        assert_eq!(defaulted.await.unwrap(), json!("also ok"));
    }

    #[test]
    fn test_zero_timeout_needs_no_runtime() {
        let (channel, transport) = channel(Channel::builder());

        let id = channel
            .request(json!(null))
            .timeout(Duration::ZERO)
            .send_with_callback(|_| {})
            .unwrap();

        assert_eq!(id, "req-1");
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_cancels_timer() {
        let (channel, _transport) = channel(Channel::builder());
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = results.clone();

        channel
            .request(json!(null))
            .timeout(Duration::from_millis(10))
            .send_with_callback(move |r| sink.lock().unwrap().push(r))
            .unwrap();
        channel
            .handle_message(json!({ "_rs": "req-1", "_b": 1 }))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(*results[0].as_ref().unwrap(), json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_unregisters_progress_handler() {
        let (channel, _transport) = channel(Channel::builder());
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = updates.clone();

        let pending = channel
            .request(json!(null))
            .timeout(Duration::from_millis(10))
            .on_progress(move |body: Value| sink.lock().unwrap().push(body))
            .send()
            .unwrap();
        assert!(channel.has_progress_handler("req-1"));

        channel
            .handle_message(json!({ "_pu": "req-1", "_b": "early" }))
            .unwrap();
        assert!(pending.await.is_err());
        assert!(!channel.has_progress_handler("req-1"));

        channel
            .handle_message(json!({ "_pu": "req-1", "_b": "late" }))
            .unwrap();
        assert_eq!(*updates.lock().unwrap(), vec![json!("early")]);
    }

    #[test]
    fn test_async_results_disabled() {
        let (channel, transport) = channel(Channel::builder().async_results(false));

        let err = channel.request(json!(null)).send().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can't make a request without an async result facility or callback"
        );
        assert_eq!(transport.sent_count(), 0);
        assert!(channel.pending_requests().is_empty());
    }

    #[test]
    fn test_callback_works_without_async_results() {
        let (channel, transport) = channel(Channel::builder().async_results(false));
        let result = Arc::new(Mutex::new(None));
        let sink = result.clone();

        let id = channel
            .request(json!("hi"))
            .send_with_callback(move |r| *sink.lock().unwrap() = Some(r))
            .unwrap();
        assert_eq!(transport.sent_count(), 1);

        channel
            .handle_message(json!({ "_rs": id, "_b": "there" }))
            .unwrap();
        assert_eq!(
            result.lock().unwrap().take().map(|r| r.unwrap()),
            Some(json!("there"))
        );
    }

    #[test]
    fn test_progress_handler_rejected_when_disabled() {
        let (channel, transport) = channel(Channel::builder().progress_updates(false));

        let result = channel
            .request(json!(null))
            .on_progress(|_: Value| {})
            .send_with_callback(|_| panic!("completion must not run"));

        assert!(matches!(result, Err(ChannelError::ProgressDisabled)));
        assert_eq!(transport.sent_count(), 0);
        assert_eq!(channel.progress_handlers(), 0);
    }

    #[test]
    fn test_timeout_needs_runtime() {
        let (channel, transport) = channel(Channel::builder());

        let result = channel
            .request(json!(null))
            .timeout(Duration::from_millis(10))
            .send_with_callback(|_| {});

        assert!(matches!(result, Err(ChannelError::NoRuntime)));
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_rejects_and_cleans_up() {
        let (channel, transport) = channel(Channel::builder());
        transport.close();

        let pending = channel
            .request(json!(null))
            .on_progress(|_: Value| {})
            .send()
            .unwrap();

        assert!(matches!(pending.await, Err(ChannelError::ConnectionClosed)));
        assert_eq!(channel.progress_handlers(), 0);
        assert!(channel.pending_requests().is_empty());
    }

    #[test]
    fn test_typed_progress_handler() {
        #[derive(serde::Deserialize)]
        struct Percent {
            percent: u8,
        }

        let (channel, _transport) = channel(Channel::builder());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        channel
            .request(json!(null))
            .on_progress_typed(move |p: Percent| sink.lock().unwrap().push(p.percent))
            .send_with_callback(|_| {})
            .unwrap();

        channel
            .handle_message(json!({ "_pu": "req-1", "_b": { "percent": 40 } }))
            .unwrap();
        assert!(channel
            .handle_message(json!({ "_pu": "req-1", "_b": "not a percent" }))
            .is_err());
        assert_eq!(*seen.lock().unwrap(), vec![40]);
    }
}
