//! HTTP - routed requests with progress.
//!
//! One side serves a [`Router`]; the other calls it with `post(..)` and
//! `get(..)`, receiving `{ status, body }` replies.

use progwire::{Channel, ChannelError, RouteRequest, RouteResponder, Router};
use serde_json::{json, Value};
use tracing_subscriber::{prelude::*, EnvFilter};

fn router() -> Router {
    Router::new()
        .post("/uploads", |req: RouteRequest, res: RouteResponder| {
            let size = req.body["size"].as_u64().unwrap_or(0);
            for done in (0..=size).step_by(25) {
                res.send_progress_update(json!({ "bytes": done, "of": size }))?;
            }
            res.status(201).send(json!({ "stored": size }))
        })
        .get("/uploads/latest", |_req: RouteRequest, res: RouteResponder| {
            res.status(404).send(json!("nothing uploaded yet"))
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (a, b) = tokio::io::duplex(64 * 1024);
    let (_server, _) = Channel::builder().router(router()).connect(a);
    let (client, _) = Channel::builder().connect(b);

    if let Some(pending) = client
        .post("/uploads")
        .body(json!({ "size": 100 }))
        .on_progress_update(|update: Value| println!("progress: {}", update))
        .send()?
        .into_pending()
    {
        let response = pending.await?;
        println!("{} {}", response.status, response.body);
    }

    if let Some(pending) = client.get("/uploads/latest").send()?.into_pending() {
        match pending.await {
            Ok(response) => println!("{} {}", response.status, response.body),
            Err(ChannelError::Status(response)) => {
                println!("failed: {} {}", response.status, response.body)
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
