//! `srat watch`: print the snapshot on every change until Ctrl-C.

use srat_core::SratClient;
use tracing::info;

use crate::cli::WatchArgs;
use crate::error::CliError;

use super::{print_json, stream_failed};

pub async fn handle(args: WatchArgs, client: &SratClient) -> Result<(), CliError> {
    let mut snapshots = client.subscribe();
    let mut states = client.subscribe_connection_state();
    client.connect().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
            err = stream_failed(&mut states, client) => return Err(err),
            changed = snapshots.changed() => {
                let Some(snapshot) = changed else {
                    return Ok(());
                };
                print_json(&*snapshot, args.compact)?;
            }
        }
    }
}
