//! Pending request table.
//!
//! A request is pending from the moment its completion is registered until
//! the first `resolve` or `reject` for its id. Removing the entry under the
//! lock is the `pending -> settled` transition, so a second terminal signal
//! (a timer firing after the response, or the other way round) finds nothing
//! and does nothing.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::error::{ChannelError, Result};

/// Completion callback for callback-mode requests.
pub type CompletionCallback = Box<dyn FnOnce(Result<Value>) + Send + 'static>;

/// Sending half of an async-mode request.
pub type ResponseSender = oneshot::Sender<Result<Value>>;

/// Request/response correlation store.
pub trait CorrelationStore: Send + Sync + 'static {
    /// Register a callback completion for `id`.
    fn add_callback(&self, id: &str, callback: CompletionCallback);

    /// Register an async waiter for `id`.
    fn add_waiter(&self, id: &str, waiter: ResponseSender);

    /// Attach the timeout task of `id`, aborted when the request settles.
    fn attach_timer(&self, id: &str, timer: AbortHandle);

    /// Settle `id` successfully. Returns `false` if it was not pending.
    fn resolve(&self, id: &str, value: Value) -> bool;

    /// Settle `id` with an error. Returns `false` if it was not pending.
    fn reject(&self, id: &str, error: ChannelError) -> bool;

    /// Check whether `id` is pending.
    fn is_pending(&self, id: &str) -> bool;

    /// Ids of all pending requests.
    fn pending_ids(&self) -> Vec<String>;
}

enum Completion {
    Callback(CompletionCallback),
    Waiter(ResponseSender),
}

struct PendingRequest {
    completion: Completion,
    timer: Option<AbortHandle>,
}

/// Default [`CorrelationStore`].
#[derive(Default)]
pub struct RequestStore {
    pending: Mutex<HashMap<String, PendingRequest>>,
}

impl RequestStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn insert(&self, id: &str, completion: Completion) {
        let previous = self.lock().insert(
            id.to_string(),
            PendingRequest {
                completion,
                timer: None,
            },
        );
        if previous.is_some() {
            tracing::warn!("Correlation id {} reused while still pending", id);
        }
    }

    fn settle(&self, id: &str, result: Result<Value>) -> bool {
        // Lock is released before the completion runs
        let entry = self.lock().remove(id);
        let Some(request) = entry else {
            tracing::debug!("Ignoring settlement of {}: not pending", id);
            return false;
        };

        if let Some(timer) = request.timer {
            timer.abort();
        }

        match request.completion {
            Completion::Callback(callback) => callback(result),
            Completion::Waiter(waiter) => {
                if waiter.send(result).is_err() {
                    tracing::debug!("Waiter for {} dropped before settlement", id);
                }
            }
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CorrelationStore for RequestStore {
    fn add_callback(&self, id: &str, callback: CompletionCallback) {
        self.insert(id, Completion::Callback(callback));
    }

    fn add_waiter(&self, id: &str, waiter: ResponseSender) {
        self.insert(id, Completion::Waiter(waiter));
    }

    fn attach_timer(&self, id: &str, timer: AbortHandle) {
        match self.lock().get_mut(id) {
            Some(request) => request.timer = Some(timer),
            None => timer.abort(),
        }
    }

    fn resolve(&self, id: &str, value: Value) -> bool {
        self.settle(id, Ok(value))
    }

    fn reject(&self, id: &str, error: ChannelError) -> bool {
        self.settle(id, Err(error))
    }

    fn is_pending(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    fn pending_ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn capture() -> (Arc<Mutex<Vec<Result<Value>>>>, CompletionCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, Box::new(move |result| sink.lock().unwrap().push(result)))
    }

    #[test]
    fn test_resolve_calls_callback_once() {
        let store = RequestStore::new();
        let (seen, callback) = capture();
        store.add_callback("1", callback);

        assert!(store.resolve("1", json!("Hey there")));
        assert!(!store.resolve("1", json!("again")));
        assert!(!store.reject("1", ChannelError::Timeout { millis: 10 }));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_ref().unwrap(), &json!("Hey there"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_reject_then_resolve_is_noop() {
        let store = RequestStore::new();
        let (seen, callback) = capture();
        store.add_callback("1", callback);

        assert!(store.reject("1", ChannelError::Timeout { millis: 10 }));
        assert!(!store.resolve("1", json!("late")));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].as_ref().unwrap_err().to_string(),
            "Timed out after 10 ms"
        );
    }

    #[tokio::test]
    async fn test_waiter_receives_result() {
        let store = RequestStore::new();
        let (tx, rx) = oneshot::channel();
        store.add_waiter("w", tx);
        assert!(store.is_pending("w"));

        store.resolve("w", json!({ "ok": true }));

        assert_eq!(rx.await.unwrap().unwrap(), json!({ "ok": true }));
        assert!(!store.is_pending("w"));
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let store = RequestStore::new();
        assert!(!store.resolve("ghost", Value::Null));
        assert!(!store.reject("ghost", ChannelError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_settlement_aborts_timer() {
        let store = RequestStore::new();
        let (_seen, callback) = capture();
        store.add_callback("t", callback);

        let timer = tokio::spawn(std::future::pending::<()>());
        store.attach_timer("t", timer.abort_handle());
        store.resolve("t", Value::Null);

        assert!(timer.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_timer_for_settled_request_is_aborted() {
        let store = RequestStore::new();

        let timer = tokio::spawn(std::future::pending::<()>());
        store.attach_timer("gone", timer.abort_handle());

        assert!(timer.await.unwrap_err().is_cancelled());
    }

    #[test]
    fn test_pending_ids() {
        let store = RequestStore::new();
        store.add_callback("a", Box::new(|_| {}));
        store.add_callback("b", Box::new(|_| {}));

        let mut ids = store.pending_ids();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.len(), 2);
    }
}
