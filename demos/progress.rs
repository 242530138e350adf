//! Progress - a slow job reporting progress before it answers.
//!
//! The handler moves the responder into a task, sends a progress update per
//! step, then responds. The requester prints each update as it arrives and
//! gives up if the whole job takes longer than its timeout.

use std::time::Duration;

use progwire::{Channel, InboundMessage, Responder};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Deserialize, Debug)]
struct Step {
    step: u32,
    of: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (a, b) = tokio::io::duplex(64 * 1024);

    let (_worker, _) = Channel::builder()
        .on_message(|msg: InboundMessage, res: Responder| {
            let steps: u32 = msg.parse()?;
            tokio::spawn(async move {
                for step in 1..=steps {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    let update = json!({ "step": step, "of": steps });
                    if let Err(e) = res.send_progress_update(update) {
                        tracing::error!("Progress update failed: {}", e);
                        return;
                    }
                }
                if let Err(e) = res.respond(json!("finished")) {
                    tracing::error!("Response failed: {}", e);
                }
            });
            Ok(())
        })
        .connect(a);

    let (client, _) = Channel::builder().connect(b);

    let result = client
        .request(json!(5))
        .timeout(Duration::from_secs(2))
        .on_progress_typed(|s: Step| println!("step {}/{}", s.step, s.of))
        .send()?
        .await?;

    println!("result: {}", result);
    Ok(())
}
