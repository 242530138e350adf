//! Progress handler cleanup on request settlement.
//!
//! [`ProgressCleanup`] wraps a [`CorrelationStore`] and unregisters the
//! progress handler of a request right before the request settles, whatever
//! settled it: a response, an error response, a timeout or a failed send.
//! Progress arriving after that point finds no handler and is dropped.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::AbortHandle;

use super::ProgressRegistry;
use crate::correlation::{CompletionCallback, CorrelationStore, ResponseSender};
use crate::error::ChannelError;

/// Store decorator that keeps the progress registry in step with settlement.
pub struct ProgressCleanup<S> {
    inner: S,
    registry: Arc<ProgressRegistry>,
}

impl<S: CorrelationStore> ProgressCleanup<S> {
    /// Wrap `inner`, cleaning up handlers in `registry`.
    pub fn new(inner: S, registry: Arc<ProgressRegistry>) -> Self {
        Self { inner, registry }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: CorrelationStore> CorrelationStore for ProgressCleanup<S> {
    fn add_callback(&self, id: &str, callback: CompletionCallback) {
        self.inner.add_callback(id, callback);
    }

    fn add_waiter(&self, id: &str, waiter: ResponseSender) {
        self.inner.add_waiter(id, waiter);
    }

    fn attach_timer(&self, id: &str, timer: AbortHandle) {
        self.inner.attach_timer(id, timer);
    }

    fn resolve(&self, id: &str, value: Value) -> bool {
        self.registry.unregister(id);
        self.inner.resolve(id, value)
    }

    fn reject(&self, id: &str, error: ChannelError) -> bool {
        self.registry.unregister(id);
        self.inner.reject(id, error)
    }

    fn is_pending(&self, id: &str) -> bool {
        self.inner.is_pending(id)
    }

    fn pending_ids(&self) -> Vec<String> {
        self.inner.pending_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::RequestStore;
    use serde_json::json;
    use std::sync::Mutex;

    fn setup() -> (Arc<ProgressRegistry>, ProgressCleanup<RequestStore>) {
        let registry = Arc::new(ProgressRegistry::new());
        let store = ProgressCleanup::new(RequestStore::new(), registry.clone());
        (registry, store)
    }

    #[test]
    fn test_resolve_removes_handler() {
        let (registry, store) = setup();
        registry.register("1", |_: Value| panic!("progress after resolution"));
        store.add_callback("1", Box::new(|_| {}));

        assert!(store.resolve("1", json!("done")));
        assert!(!registry.contains("1"));
        assert!(!registry.dispatch("1", json!("late")).unwrap());
    }

    #[test]
    fn test_reject_removes_handler() {
        let (registry, store) = setup();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        registry.register("1", move |_: Value| *counter.lock().unwrap() += 1);
        store.add_callback("1", Box::new(|_| {}));

        assert!(store.reject("1", ChannelError::Rejected(json!("nope"))));
        assert!(registry.is_empty());
        assert!(!registry.dispatch("1", json!("late")).unwrap());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_handler_is_gone_when_completion_runs() {
        let (registry, store) = setup();
        let registry_in_callback = registry.clone();
        let observed = Arc::new(Mutex::new(None));
        let sink = observed.clone();

        registry.register("1", |_: Value| {});
        store.add_callback(
            "1",
            Box::new(move |_| {
                *sink.lock().unwrap() = Some(registry_in_callback.contains("1"));
            }),
        );
        store.resolve("1", Value::Null);

        assert_eq!(*observed.lock().unwrap(), Some(false));
    }

    #[test]
    fn test_settling_unknown_id_still_cleans_registry() {
        let (registry, store) = setup();
        registry.register("orphan", |_: Value| {});

        assert!(!store.resolve("orphan", Value::Null));
        assert!(registry.is_empty());
        assert!(store.inner().is_empty());
    }
}
