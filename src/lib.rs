//! # progwire
//!
//! Progress updates for request/response channels.
//!
//! A [`Channel`] sends correlated requests (`{ _rq, _b }`), answers them
//! (`{ _rs, _b }` / `{ _rs, _e }`) and, while a request is outstanding, lets
//! the answering side push any number of progress notifications
//! (`{ _pu, _b }`) before the final response.
//!
//! ## Architecture
//!
//! - **Progress registry**: one progress handler per pending request id,
//!   removed the moment the request settles
//! - **Classifier**: progress, response, request or plain, in that order
//! - **Responders**: every inbound message gets a responder with
//!   `send_progress_update`, built by an ordered layer chain
//! - **Adapters**: method/url [`router`] and HTTP-style [`http`] requests
//!
//! ## Example
//!
//! ```no_run
//! use progwire::{Channel, InboundMessage, Responder};
//! use serde_json::{json, Value};
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() -> progwire::Result<()> {
//!     let stream = TcpStream::connect("127.0.0.1:7000").await?;
//!     let (channel, _read_loop) = Channel::builder()
//!         .on_message(|msg: InboundMessage, res: Responder| {
//!             res.send_progress_update(json!("working"))?;
//!             res.respond(msg.into_body())
//!         })
//!         .connect(stream);
//!
//!     let response = channel
//!         .request(json!({ "job": 1 }))
//!         .on_progress(|update: Value| println!("progress: {}", update))
//!         .send()?
//!         .await?;
//!     println!("done: {}", response);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod codec;
pub mod correlation;
pub mod error;
pub mod http;
pub mod progress;
pub mod protocol;
pub mod responder;
pub mod router;
pub mod transport;

pub use channel::{Channel, ChannelBuilder, ChannelConfig, InboundMessage, RequestBuilder};
pub use correlation::PendingResponse;
pub use error::{ChannelError, Result};
pub use http::{HttpDispatch, HttpResponse};
pub use responder::Responder;
pub use router::{RouteRequest, RouteResponder, Router};
