//! In-memory transport that records every sent frame.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use progwire::transport::{MemoryTransport, Transport};
//!
//! let transport = MemoryTransport::new();
//! transport.send(Bytes::from_static(b"{}")).unwrap();
//! assert_eq!(transport.sent_count(), 1);
//! assert_eq!(transport.last_sent_text().as_deref(), Some("{}"));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde_json::Value;

use super::Transport;
use crate::error::{ChannelError, Result};

#[derive(Default)]
struct Inner {
    sent: Mutex<Vec<Bytes>>,
    closed: AtomicBool,
}

/// Transport that keeps sent frames in memory.
///
/// Cheaply cloneable; clones share the same record.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl MemoryTransport {
    /// Create an empty, open transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames sent so far.
    pub fn sent_count(&self) -> usize {
        self.lock().len()
    }

    /// All frames sent so far.
    pub fn sent(&self) -> Vec<Bytes> {
        self.lock().clone()
    }

    /// The most recent frame.
    pub fn last_sent(&self) -> Option<Bytes> {
        self.lock().last().cloned()
    }

    /// The most recent frame as UTF-8 text.
    pub fn last_sent_text(&self) -> Option<String> {
        self.last_sent()
            .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
    }

    /// The most recent frame parsed as JSON.
    pub fn last_sent_json(&self) -> Option<Value> {
        self.last_sent()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    /// Drop the recorded frames.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Refuse every further send with [`ChannelError::ConnectionClosed`].
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Bytes>> {
        self.inner.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    fn send(&self, message: Bytes) -> Result<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(ChannelError::ConnectionClosed);
        }
        self.lock().push(message);
        Ok(())
    }
}
