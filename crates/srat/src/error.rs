//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use srat_config::ConfigError;
use srat_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const REJECTED: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Event stream at {url} gave up after repeated failures")]
    #[diagnostic(
        code(srat::stream_failed),
        help("Raise max_retries in the profile, or run with -v to see each attempt.")
    )]
    StreamFailed { url: String },

    #[error("Event stream at {url} refused the connection (HTTP {status})")]
    #[diagnostic(
        code(srat::rejected),
        help("Check the user_id configured for this profile; run with -v for the server's answer.")
    )]
    Rejected { url: String, status: u16 },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("No complete snapshot after {waited}")]
    #[diagnostic(
        code(srat::timeout),
        help("Increase the wait with --timeout, or check that SRAT emits heartbeats.")
    )]
    Timeout { waited: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(srat::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(srat::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No SRAT instance configured")]
    #[diagnostic(
        code(srat::no_config),
        help(
            "Pass --host, or add a profile to the config file.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(srat::config))]
    Config(ConfigError),

    // ── Lifecycle ────────────────────────────────────────────────────

    #[error("SRAT client has already been shut down")]
    #[diagnostic(code(srat::shut_down))]
    ShutDown,

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not encode output: {0}")]
    #[diagnostic(code(srat::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not encode configuration: {0}")]
    #[diagnostic(code(srat::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StreamFailed { .. } => exit_code::CONNECTION,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. }
            | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config { message } => CliError::Validation {
                field: "connection".into(),
                reason: message,
            },
            CoreError::ShutDown => CliError::ShutDown,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
