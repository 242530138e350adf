//! Progress handler registry.
//!
//! Maps correlation ids to the single progress handler currently attached
//! to that request. Registering again for the same id replaces the previous
//! handler. Every channel owns its own registry.
//!
//! # Example
//!
//! ```
//! use progwire::progress::ProgressRegistry;
//! use serde_json::{json, Value};
//!
//! let registry = ProgressRegistry::new();
//! registry.register("req-1", |update: Value| println!("progress: {}", update));
//!
//! assert!(registry.dispatch("req-1", json!(50)).unwrap());
//! assert!(!registry.dispatch("unknown", json!(50)).unwrap());
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;

/// Trait for progress handlers.
pub trait ProgressHandler: Send + Sync + 'static {
    /// Handle one progress update body.
    fn call(&self, body: Value) -> Result<()>;
}

impl<F> ProgressHandler for F
where
    F: Fn(Value) + Send + Sync + 'static,
{
    fn call(&self, body: Value) -> Result<()> {
        self(body);
        Ok(())
    }
}

/// Wrapper that deserializes the update body before calling the handler.
///
/// A body that does not match `T` is reported as an error from
/// [`ProgressRegistry::dispatch`].
pub struct TypedProgressHandler<F, T>
where
    F: Fn(T) + Send + Sync + 'static,
    T: DeserializeOwned + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T)>,
}

impl<F, T> TypedProgressHandler<F, T>
where
    F: Fn(T) + Send + Sync + 'static,
    T: DeserializeOwned + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T> ProgressHandler for TypedProgressHandler<F, T>
where
    F: Fn(T) + Send + Sync + 'static,
    T: DeserializeOwned + 'static,
{
    fn call(&self, body: Value) -> Result<()> {
        let parsed: T = serde_json::from_value(body)?;
        (self.handler)(parsed);
        Ok(())
    }
}

/// Registry mapping correlation ids to progress handlers.
#[derive(Default)]
pub struct ProgressRegistry {
    handlers: Mutex<HashMap<String, Arc<dyn ProgressHandler>>>,
}

impl ProgressRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `handler` to `id`, replacing any handler already there.
    pub fn register<H: ProgressHandler>(&self, id: &str, handler: H) {
        self.register_shared(id, Arc::new(handler));
    }

    /// Attach an already shared handler to `id`.
    pub fn register_shared(&self, id: &str, handler: Arc<dyn ProgressHandler>) {
        self.lock().insert(id.to_string(), handler);
    }

    /// Remove the handler for `id`. Returns whether one was present.
    pub fn unregister(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Deliver `body` to the handler registered for `id`.
    ///
    /// Returns `Ok(false)` when no handler is registered. The handler runs
    /// outside the registry lock, so it may register or unregister ids.
    ///
    /// # Errors
    ///
    /// Whatever the handler itself returns.
    pub fn dispatch(&self, id: &str, body: Value) -> Result<bool> {
        let handler = match self.lock().get(id) {
            Some(handler) => handler.clone(),
            None => return Ok(false),
        };

        handler.call(body)?;
        Ok(true)
    }

    /// Check whether a handler is registered for `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn ProgressHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ProgressRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, impl Fn(Value) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |body: Value| sink.lock().unwrap().push(body))
    }

    #[test]
    fn test_dispatch_without_registration_is_noop() {
        let registry = ProgressRegistry::new();
        assert!(!registry.dispatch("nobody", json!("x")).unwrap());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dispatch_calls_handler() {
        let registry = ProgressRegistry::new();
        let (seen, handler) = recorder();
        registry.register("hello", handler);

        assert!(registry.dispatch("hello", json!("Progress!")).unwrap());
        assert!(registry.dispatch("hello", json!("More!")).unwrap());

        assert_eq!(*seen.lock().unwrap(), vec![json!("Progress!"), json!("More!")]);
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = ProgressRegistry::new();
        let (first, h1) = recorder();
        let (second, h2) = recorder();

        registry.register("id", h1);
        registry.register("id", h2);
        registry.dispatch("id", json!(1)).unwrap();

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), vec![json!(1)]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = ProgressRegistry::new();
        let (seen, handler) = recorder();
        registry.register("id", handler);

        assert!(registry.unregister("id"));
        assert!(!registry.unregister("id"));
        assert!(!registry.dispatch("id", json!(1)).unwrap());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_typed_handler() {
        #[derive(serde::Deserialize)]
        struct Step {
            done: u32,
            total: u32,
        }

        let registry = ProgressRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry.register(
            "job",
            TypedProgressHandler::new(move |step: Step| {
                sink.lock().unwrap().push((step.done, step.total));
            }),
        );

        registry
            .dispatch("job", json!({ "done": 3, "total": 10 }))
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(3, 10)]);
    }

    #[test]
    fn test_handler_error_propagates() {
        let registry = ProgressRegistry::new();
        registry.register("job", TypedProgressHandler::new(|_: u32| {}));

        let result = registry.dispatch("job", json!("not a number"));
        assert!(matches!(result, Err(ChannelError::Json(_))));
    }

    #[test]
    fn test_handler_may_unregister_itself() {
        let registry = Arc::new(ProgressRegistry::new());
        let inner = registry.clone();
        registry.register("once", move |_: Value| {
            inner.unregister("once");
        });

        assert!(registry.dispatch("once", json!(null)).unwrap());
        assert!(!registry.contains("once"));
    }
}
