//! Method/url routing for inbound requests.
//!
//! A message body of the form `{ _m: method, _u: url, _b: body }` is a
//! routed request. When the channel has a [`Router`], such messages go to the
//! handler registered for their method and url instead of the message
//! handler. Replies carry an HTTP-style status: `{ _s: status, _b: body }`.
//!
//! # Example
//!
//! ```
//! use progwire::router::{RouteRequest, RouteResponder, Router};
//! use serde_json::json;
//!
//! let router = Router::new()
//!     .get("/status", |_req: RouteRequest, res: RouteResponder| {
//!         res.send_progress_update(json!("checking"))?;
//!         res.send(json!({ "ok": true }))
//!     })
//!     .post("/items", |req: RouteRequest, res: RouteResponder| {
//!         res.status(201).send(req.body)
//!     });
//!
//! assert_eq!(router.len(), 2);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::channel::HandlerResult;
use crate::error::Result;
use crate::protocol::keys;
use crate::responder::Responder;

/// Status sent by [`RouteResponder::send`] unless changed.
pub const DEFAULT_STATUS: u16 = 200;

/// A routed request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    /// Method, upper-cased.
    pub method: String,
    /// Url as sent.
    pub url: String,
    /// Request body (`_b`), `null` when absent.
    pub body: Value,
    /// Correlation id when the sender waits for a reply.
    pub request_id: Option<String>,
}

impl RouteRequest {
    /// Read `{ _m, _u, _b }` out of a message body.
    ///
    /// Returns `None` unless the body is an object with string `_m` and `_u`.
    pub fn parse(body: &Value, request_id: Option<String>) -> Option<Self> {
        let object = body.as_object()?;
        let method = object.get(keys::METHOD)?.as_str()?;
        let url = object.get(keys::URL)?.as_str()?;

        Some(Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            body: object.get(keys::BODY).cloned().unwrap_or(Value::Null),
            request_id,
        })
    }
}

/// Responder handed to route handlers.
///
/// Wraps the channel's decorated [`Responder`], so progress updates behave
/// exactly as they do for the message handler.
#[derive(Debug, Clone)]
pub struct RouteResponder {
    responder: Responder,
    status: u16,
}

impl RouteResponder {
    pub(crate) fn new(responder: Responder) -> Self {
        Self {
            responder,
            status: DEFAULT_STATUS,
        }
    }

    /// Set the reply status.
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Send `{ _s: status, _b: body }`.
    ///
    /// Statuses of 400 and above go out as error responses. Nothing is sent
    /// for routed messages that expect no reply.
    pub fn send(&self, body: Value) -> Result<()> {
        let reply = json!({ (keys::STATUS): self.status, (keys::BODY): body });
        if self.status >= 400 {
            self.responder.error(reply)
        } else {
            self.responder.respond(reply)
        }
    }

    /// Push a progress update to the requester.
    ///
    /// See [`Responder::send_progress_update`].
    pub fn send_progress_update(&self, body: Value) -> Result<&Self> {
        self.responder.send_progress_update(body)?;
        Ok(self)
    }

    /// Correlation id of the request.
    pub fn request_id(&self) -> Option<&str> {
        self.responder.request_id()
    }

    /// The underlying responder.
    pub fn responder(&self) -> &Responder {
        &self.responder
    }
}

/// Trait for route handlers.
pub trait RouteHandler: Send + Sync + 'static {
    /// Handle one routed request.
    fn call(&self, request: RouteRequest, responder: RouteResponder) -> HandlerResult;
}

impl<F> RouteHandler for F
where
    F: Fn(RouteRequest, RouteResponder) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, request: RouteRequest, responder: RouteResponder) -> HandlerResult {
        self(request, responder)
    }
}

/// Route table keyed by method and url.
#[derive(Default)]
pub struct Router {
    routes: HashMap<(String, String), Arc<dyn RouteHandler>>,
    fallback: Option<Arc<dyn RouteHandler>>,
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` and `url`, replacing any previous one.
    pub fn route<H: RouteHandler>(mut self, method: &str, url: &str, handler: H) -> Self {
        self.routes.insert(
            (method.to_ascii_uppercase(), url.to_string()),
            Arc::new(handler),
        );
        self
    }

    /// Register a `GET` handler.
    pub fn get<H: RouteHandler>(self, url: &str, handler: H) -> Self {
        self.route("GET", url, handler)
    }

    /// Register a `POST` handler.
    pub fn post<H: RouteHandler>(self, url: &str, handler: H) -> Self {
        self.route("POST", url, handler)
    }

    /// Register a `PUT` handler.
    pub fn put<H: RouteHandler>(self, url: &str, handler: H) -> Self {
        self.route("PUT", url, handler)
    }

    /// Register a `DELETE` handler.
    pub fn delete<H: RouteHandler>(self, url: &str, handler: H) -> Self {
        self.route("DELETE", url, handler)
    }

    /// Register a `PATCH` handler.
    pub fn patch<H: RouteHandler>(self, url: &str, handler: H) -> Self {
        self.route("PATCH", url, handler)
    }

    /// Handler for routed requests that match no route.
    ///
    /// Without one, unmatched requests get a 404 reply.
    pub fn fallback<H: RouteHandler>(mut self, handler: H) -> Self {
        self.fallback = Some(Arc::new(handler));
        self
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch one routed request.
    pub fn dispatch(&self, request: RouteRequest, responder: Responder) -> HandlerResult {
        let key = (request.method.clone(), request.url.clone());
        let responder = RouteResponder::new(responder);

        if let Some(handler) = self.routes.get(&key).or(self.fallback.as_ref()) {
            return handler.call(request, responder);
        }

        if responder.request_id().is_some() {
            tracing::debug!("No route for {} {}", request.method, request.url);
            responder.status(404).send(json!("Not Found"))
        } else {
            tracing::debug!(
                "No route for {} {}, dropping message",
                request.method,
                request.url
            );
            Ok(())
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut routes: Vec<String> = self
            .routes
            .keys()
            .map(|(method, url)| format!("{} {}", method, url))
            .collect();
        routes.sort();
        f.debug_struct("Router")
            .field("routes", &routes)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
