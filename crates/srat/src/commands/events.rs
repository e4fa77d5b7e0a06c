//! `srat events`: tap raw frames for the requested event types and print
//! them as JSON lines.

use serde_json::Value;
use srat_core::SratClient;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::EventsArgs;
use crate::error::CliError;

use super::{frame_line, print_json, stream_failed};

pub async fn handle(args: EventsArgs, client: &SratClient) -> Result<(), CliError> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handles: Vec<_> = args
        .types
        .iter()
        .map(|event_type| {
            let tx = tx.clone();
            let name = event_type.clone();
            client.register_listener(event_type.as_str(), move |payload: &Value| {
                tx.send(frame_line(&name, payload.clone()))?;
                Ok(())
            })
        })
        .collect();
    drop(tx);
    debug!(types = ?args.types, "listening for raw frames");

    let mut states = client.subscribe_connection_state();
    client.connect().await?;

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break Ok(());
            }
            err = stream_failed(&mut states, client) => break Err(err),
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    break Ok(());
                };
                if let Err(err) = print_json(&frame, true) {
                    break Err(err);
                }
            }
        }
    };

    for handle in handles {
        handle.unregister();
    }
    result
}
