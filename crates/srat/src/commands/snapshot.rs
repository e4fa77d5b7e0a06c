//! `srat snapshot`: wait for volumes and a heartbeat, print once.

use srat_core::{SratClient, StateSnapshot};
use tokio::time::timeout;

use crate::cli::SnapshotArgs;
use crate::error::CliError;

use super::{print_json, stream_failed};

fn is_complete(snapshot: &StateSnapshot) -> bool {
    snapshot.has_volumes() && snapshot.has_heartbeat()
}

pub async fn handle(args: SnapshotArgs, client: &SratClient) -> Result<(), CliError> {
    let mut snapshots = client.subscribe();
    let mut states = client.subscribe_connection_state();
    client.connect().await?;

    let wait = async {
        if is_complete(snapshots.current()) {
            return Ok(std::sync::Arc::clone(snapshots.current()));
        }
        loop {
            tokio::select! {
                err = stream_failed(&mut states, client) => return Err(err),
                changed = snapshots.changed() => match changed {
                    Some(snapshot) if is_complete(&snapshot) => return Ok(snapshot),
                    Some(_) => {}
                    None => return Err(CliError::ShutDown),
                },
            }
        }
    };

    let snapshot = timeout(args.timeout, wait)
        .await
        .map_err(|_| CliError::Timeout {
            waited: humantime::format_duration(args.timeout).to_string(),
        })??;

    print_json(&*snapshot, args.compact)
}
