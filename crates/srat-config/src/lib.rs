//! Shared configuration for SRAT event-stream tools.
//!
//! TOML profiles with a `[defaults]` table, layered with `SRAT_`-prefixed
//! environment variables, and translation to `srat_core::ClientConfig`.
//! The CLI adds flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use srat_core::config::DEFAULT_PORT;
use srat_core::{ClientConfig, ReconnectPolicy, StreamTransport};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Settings every profile inherits.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named SRAT instances.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// `websocket` or `sse`.
    #[serde(default = "default_transport")]
    pub transport: String,

    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// `fixed` or `exponential`.
    #[serde(default = "default_backoff")]
    pub backoff: String,

    /// Humantime durations, e.g. `"5s"`, `"1m 30s"`.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: String,
    #[serde(default = "default_max_delay")]
    pub max_delay: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,
    #[serde(default = "default_heartbeat")]
    pub heartbeat: String,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: String,

    pub max_retries: Option<u32>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            user_id: default_user_id(),
            backoff: default_backoff(),
            reconnect_delay: default_reconnect_delay(),
            max_delay: default_max_delay(),
            connect_timeout: default_connect_timeout(),
            heartbeat: default_heartbeat(),
            idle_timeout: default_idle_timeout(),
            max_retries: None,
        }
    }
}

fn default_transport() -> String {
    "websocket".into()
}
fn default_user_id() -> String {
    "homeassistant".into()
}
fn default_backoff() -> String {
    "fixed".into()
}
fn default_reconnect_delay() -> String {
    "5s".into()
}
fn default_max_delay() -> String {
    "60s".into()
}
fn default_connect_timeout() -> String {
    "30s".into()
}
fn default_heartbeat() -> String {
    "30s".into()
}
fn default_idle_timeout() -> String {
    "90s".into()
}

/// A named SRAT instance. Unset fields fall back to `[defaults]`.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// Hostname or IP address.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub transport: Option<String>,
    pub user_id: Option<String>,
    pub reconnect_delay: Option<String>,
    pub max_retries: Option<u32>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            transport: None,
            user_id: None,
            reconnect_delay: None,
            max_retries: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "srat", "srat").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("srat");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from an explicit file + environment. A missing file is not an
/// error: defaults and environment still apply.
///
/// Environment keys use `__` as the nesting separator, e.g.
/// `SRAT_DEFAULTS__TRANSPORT=sse` or `SRAT_PROFILES__NAS__HOST=10.0.0.5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SRAT_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Profile resolution ──────────────────────────────────────────────

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name.to_owned(), p))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

/// Build a `ClientConfig` from a profile and the global defaults.
pub fn profile_to_client_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }

    let transport = parse_transport(profile.transport.as_deref().unwrap_or(&defaults.transport))?;
    let delay = parse_duration(
        "reconnect_delay",
        profile
            .reconnect_delay
            .as_deref()
            .unwrap_or(&defaults.reconnect_delay),
    )?;

    let reconnect = match defaults.backoff.as_str() {
        "fixed" => ReconnectPolicy::Fixed { delay },
        "exponential" => ReconnectPolicy::Exponential {
            initial: delay,
            max: parse_duration("max_delay", &defaults.max_delay)?,
        },
        other => {
            return Err(ConfigError::Validation {
                field: "backoff".into(),
                reason: format!("expected 'fixed' or 'exponential', got '{other}'"),
            });
        }
    };

    Ok(ClientConfig {
        host: profile.host.clone(),
        port: profile.port,
        transport,
        user_id: profile
            .user_id
            .clone()
            .unwrap_or_else(|| defaults.user_id.clone()),
        reconnect,
        max_retries: profile.max_retries.or(defaults.max_retries),
        connect_timeout: parse_duration("connect_timeout", &defaults.connect_timeout)?,
        heartbeat: parse_duration("heartbeat", &defaults.heartbeat)?,
        idle_timeout: parse_duration("idle_timeout", &defaults.idle_timeout)?,
    })
}

/// Parse `websocket` / `ws` / `sse`.
pub fn parse_transport(raw: &str) -> Result<StreamTransport, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "websocket" | "ws" => Ok(StreamTransport::WebSocket),
        "sse" => Ok(StreamTransport::Sse),
        other => Err(ConfigError::Validation {
            field: "transport".into(),
            reason: format!("expected 'websocket' or 'sse', got '{other}'"),
        }),
    }
}

fn parse_duration(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{raw}': {e}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults.transport, "websocket");
        assert_eq!(config.defaults.reconnect_delay, "5s");
    }

    #[test]
    fn profile_inherits_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
default_profile = "nas"

[defaults]
transport = "sse"
heartbeat = "15s"

[profiles.nas]
host = "192.168.1.100"
"#,
        );

        let config = load_config_from(&path).unwrap();
        let (name, profile) = config.profile(None).unwrap();
        assert_eq!(name, "nas");

        let client = profile_to_client_config(profile, &config.defaults).unwrap();
        assert_eq!(client.host, "192.168.1.100");
        assert_eq!(client.port, 8099);
        assert_eq!(client.transport, StreamTransport::Sse);
        assert_eq!(client.user_id, "homeassistant");
        assert_eq!(client.heartbeat, Duration::from_secs(15));
        assert_eq!(client.reconnect.delay(3), Duration::from_secs(5));
    }

    #[test]
    fn profile_overrides_win() {
        let profile = Profile {
            host: "srat.local".into(),
            port: 3000,
            transport: Some("ws".into()),
            user_id: Some("admin".into()),
            reconnect_delay: Some("250ms".into()),
            max_retries: Some(4),
        };
        let defaults = Defaults {
            transport: "sse".into(),
            ..Defaults::default()
        };

        let client = profile_to_client_config(&profile, &defaults).unwrap();
        assert_eq!(client.transport, StreamTransport::WebSocket);
        assert_eq!(client.user_id, "admin");
        assert_eq!(client.max_retries, Some(4));
        assert_eq!(client.reconnect.delay(0), Duration::from_millis(250));
    }

    #[test]
    fn exponential_backoff_is_configurable() {
        let profile = Profile {
            host: "srat.local".into(),
            ..Profile::default()
        };
        let defaults = Defaults {
            backoff: "exponential".into(),
            reconnect_delay: "1s".into(),
            max_delay: "30s".into(),
            ..Defaults::default()
        };

        let client = profile_to_client_config(&profile, &defaults).unwrap();
        assert_eq!(
            client.reconnect,
            ReconnectPolicy::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let profile = Profile {
            host: "srat.local".into(),
            transport: Some("carrier-pigeon".into()),
            ..Profile::default()
        };
        let err = profile_to_client_config(&profile, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "transport"));

        let defaults = Defaults {
            heartbeat: "soon".into(),
            ..Defaults::default()
        };
        let profile = Profile {
            host: "srat.local".into(),
            ..Profile::default()
        };
        let err = profile_to_client_config(&profile, &defaults).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "heartbeat"));
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let config = Config::default();
        let err = config.profile(Some("missing")).unwrap_err();
        assert_eq!(err.to_string(), "profile 'missing' not found in config");
    }

    #[test]
    fn malformed_toml_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[profiles.nas\nhost = ");
        assert!(matches!(load_config_from(&path), Err(ConfigError::Figment(_))));
    }
}
