//! Config subcommand handlers.

use std::io::Write;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    match args.command {
        ConfigCommand::Path => {
            writeln!(out, "{}", config::config_file(global).display())?;
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            write!(out, "{}", toml::to_string_pretty(&cfg)?)?;

            // The connection this invocation would use, flags included.
            writeln!(out)?;
            match config::resolve_client_config(global, &cfg) {
                Ok(client) => {
                    let stream = client.stream_config()?;
                    writeln!(out, "# endpoint = \"{}\"", stream.url)?;
                    writeln!(out, "# user_id = \"{}\"", client.user_id)?;
                }
                Err(CliError::NoConfig { .. }) => {
                    writeln!(out, "# no connection configured")?;
                }
                Err(err) => return Err(err),
            }
        }
    }
    Ok(())
}
