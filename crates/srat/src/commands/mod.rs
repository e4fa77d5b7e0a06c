//! Command handlers. Everything except `config` needs a client.

pub mod config_cmd;
pub mod events;
pub mod snapshot;
pub mod watch;

use std::io::Write;

use serde_json::Value;
use srat_core::{ConnectionState, SratClient};
use tokio::sync::watch as state_watch;

use crate::cli::Command;
use crate::error::CliError;

pub async fn dispatch(cmd: Command, client: &SratClient) -> Result<(), CliError> {
    let result = match cmd {
        Command::Watch(args) => watch::handle(args, client).await,
        Command::Events(args) => events::handle(args, client).await,
        Command::Snapshot(args) => snapshot::handle(args, client).await,
        Command::Config(_) => unreachable!("config commands are handled before connecting"),
    };
    client.shutdown().await;
    result
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Write one JSON document to stdout.
pub(crate) fn print_json(value: &impl serde::Serialize, compact: bool) -> Result<(), CliError> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    let mut out = std::io::stdout().lock();
    writeln!(out, "{text}")?;
    out.flush()?;
    Ok(())
}

/// One raw frame as printed by `events`.
pub(crate) fn frame_line(event_type: &str, payload: Value) -> Value {
    serde_json::json!({
        "event": event_type,
        "received_at": chrono::Utc::now().to_rfc3339(),
        "data": payload,
    })
}

/// Resolve once the stream has reached a terminal state: retries exhausted
/// or the server refused it.
pub(crate) async fn stream_failed(
    states: &mut state_watch::Receiver<ConnectionState>,
    client: &SratClient,
) -> CliError {
    let url = client.endpoint().to_string();
    let terminal = states
        .wait_for(|state| {
            matches!(state, ConnectionState::Failed | ConnectionState::Rejected { .. })
        })
        .await
        .map(|state| *state);
    match terminal {
        Ok(ConnectionState::Rejected { status }) => CliError::Rejected { url, status },
        // A closed channel means the stream is gone; treat it like a failure.
        _ => CliError::StreamFailed { url },
    }
}
