//! Progress module - handler registry, outbound updates and cleanup.
//!
//! Provides:
//! - [`ProgressRegistry`] - maps correlation ids to progress handlers
//! - [`send_progress_update`] - sends a progress notification
//! - [`ProgressCleanup`] - drops a request's handler when it settles

mod cleanup;
mod registry;
mod sender;

pub use cleanup::ProgressCleanup;
pub use registry::{ProgressHandler, ProgressRegistry, TypedProgressHandler};
pub use sender::send_progress_update;
