//! Resolves the config file, profile and command-line overrides into a
//! `ClientConfig`.

use std::path::PathBuf;

use srat_config::{Config, ConfigError, Profile};
use srat_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file in effect: `--config` if given, otherwise the platform path.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(srat_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(srat_config::load_config_from(&config_file(global))?)
}

/// Build the connection settings for this invocation.
///
/// The named (or default) profile is used when it exists. Without one,
/// `--host` alone is enough; the profile-less connection inherits
/// `[defaults]`. Flags override whatever the profile says.
pub fn resolve_client_config(global: &GlobalOpts, cfg: &Config) -> Result<ClientConfig, CliError> {
    let mut client = match cfg.profile(global.profile.as_deref()) {
        Ok((_, profile)) => srat_config::profile_to_client_config(profile, &cfg.defaults)?,
        Err(ConfigError::UnknownProfile { name }) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(cfg),
            });
        }
        Err(ConfigError::UnknownProfile { .. }) => {
            let Some(host) = global.host.clone() else {
                return Err(CliError::NoConfig {
                    path: config_file(global).display().to_string(),
                });
            };
            let adhoc = Profile {
                host,
                ..Profile::default()
            };
            srat_config::profile_to_client_config(&adhoc, &cfg.defaults)?
        }
        Err(other) => return Err(other.into()),
    };

    if let Some(ref host) = global.host {
        client.host.clone_from(host);
    }
    if let Some(port) = global.port {
        client.port = port;
    }
    if let Some(transport) = global.transport {
        client.transport = transport.into();
    }

    tracing::debug!(
        host = %client.host,
        port = client.port,
        transport = ?client.transport,
        "resolved connection"
    );
    Ok(client)
}

fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}
