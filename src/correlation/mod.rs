//! Correlation module - ids, pending requests and awaitable responses.
//!
//! Provides:
//! - [`IdGenerator`] - fresh correlation ids ([`UuidGenerator`] by default)
//! - [`CorrelationStore`] / [`RequestStore`] - pending request table with an
//!   idempotent terminal transition
//! - [`PendingResponse`] - future returned by async-mode requests

mod id;
mod pending;
mod store;

pub use id::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use pending::PendingResponse;
pub use store::{CompletionCallback, CorrelationStore, RequestStore, ResponseSender};
