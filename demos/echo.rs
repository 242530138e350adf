//! Echo - request/response over TCP.
//!
//! This example demonstrates:
//! - Building a channel over a byte stream with `connect`
//! - Answering requests from the message handler
//! - Awaiting a response with `request(..).send()`
//!
//! Run with `RUST_LOG=debug` to see correlation logs:
//!
//! ```sh
//! RUST_LOG=debug cargo run --example echo
//! ```

use progwire::{Channel, InboundMessage, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Deserialize, Debug)]
struct EchoInput {
    message: String,
}

#[derive(Serialize, Debug)]
struct EchoOutput {
    echo: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((stream, peer)) = listener.accept().await {
            tracing::info!("Accepted {}", peer);
            let (_channel, _read_loop) = Channel::builder()
                .on_message(|msg: InboundMessage, res: Responder| {
                    let input: EchoInput = msg.parse()?;
                    res.respond(serde_json::to_value(EchoOutput {
                        echo: input.message,
                    })?)
                })
                .connect(stream);
        }
    });

    let (client, _read_loop) = Channel::builder().connect(TcpStream::connect(addr).await?);
    let response = client
        .request(json!({ "message": "hello" }))
        .send()?
        .await?;

    println!("{}", response);
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
