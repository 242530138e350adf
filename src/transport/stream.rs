//! Stream transport backed by a dedicated writer task.
//!
//! Senders push encoded messages into an mpsc queue; a single task drains it
//! and writes length-prefixed frames to the stream.
//!
//! ```text
//! Channel ──┐
//! Responder ┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► AsyncWrite
//! Timer ────┘
//! ```
//!
//! Frames that are ready together are written as one batch with
//! scatter/gather I/O (`write_vectored`).

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Transport;
use crate::error::{ChannelError, Result};
use crate::protocol::{encode_length, DEFAULT_MAX_MESSAGE_SIZE, LENGTH_PREFIX_SIZE};

/// Default capacity of the outbound queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written.
#[derive(Debug)]
struct OutboundFrame {
    /// Big endian payload length.
    prefix: [u8; LENGTH_PREFIX_SIZE],
    /// Encoded message.
    payload: Bytes,
}

impl OutboundFrame {
    fn new(payload: Bytes) -> Self {
        Self {
            prefix: encode_length(payload.len()),
            payload,
        }
    }

    /// Total size of this frame (prefix + payload).
    #[inline]
    fn size(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.payload.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct StreamTransportConfig {
    /// Capacity of the outbound queue.
    pub channel_capacity: usize,
    /// Largest payload accepted by [`StreamTransport::send`].
    pub max_message_size: u32,
}

impl Default for StreamTransportConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Handle for queueing frames to the writer task.
///
/// Cheaply cloneable. The writer task ends once every handle is dropped.
#[derive(Clone)]
pub struct StreamTransport {
    tx: mpsc::Sender<OutboundFrame>,
    max_message_size: u32,
}

impl Transport for StreamTransport {
    fn send(&self, message: Bytes) -> Result<()> {
        if message.len() > self.max_message_size as usize {
            return Err(ChannelError::MessageTooLarge {
                size: u32::try_from(message.len()).unwrap_or(u32::MAX),
                max: self.max_message_size,
            });
        }
        self.tx
            .try_send(OutboundFrame::new(message))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ChannelError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => ChannelError::ConnectionClosed,
            })
    }
}

/// Spawn the writer task and return a transport handle for it.
///
/// The returned `JoinHandle` resolves when the queue closes or a write
/// fails.
pub fn spawn_stream_transport<W>(
    writer: W,
    config: StreamTransportConfig,
) -> (StreamTransport, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    let transport = StreamTransport {
        tx,
        max_message_size: config.max_message_size,
    };
    (transport, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(f) => f,
            None => {
                // Channel closed, clean shutdown
                return Ok(());
            }
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!("Writer task failed after {} queued frames: {}", batch.len(), e);
            return Err(e);
        }
    }
}

/// Write a batch of frames using scatter/gather I/O.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(|f| f.size()).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(ChannelError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data after the first `skip_bytes` bytes.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        for part in [&frame.prefix[..], &frame.payload[..]] {
            let end = offset + part.len();
            if !part.is_empty() && skip_bytes < end {
                let start = skip_bytes.saturating_sub(offset);
                slices.push(IoSlice::new(&part[start..]));
            }
            offset = end;
        }
    }

    slices
}
