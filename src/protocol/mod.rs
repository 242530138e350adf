//! Protocol module - wire messages, classification and framing.
//!
//! - Tagged message shapes and their short wire keys
//! - Classifier deciding progress / response / request / plain
//! - Length-prefixed frame buffer for stream transports

mod classify;
mod frame_buffer;
mod message;

pub use classify::classify;
pub use frame_buffer::{
    encode_frame, encode_length, FrameBuffer, DEFAULT_MAX_MESSAGE_SIZE, LENGTH_PREFIX_SIZE,
};
pub use message::{keys, WireMessage};
