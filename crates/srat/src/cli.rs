//! Clap derive structures for the `srat` CLI.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use srat_core::StreamTransport;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// srat -- follow the live state of a SRAT instance
#[derive(Debug, Parser)]
#[command(
    name = "srat",
    version,
    about = "Follow the real-time event stream of a SRAT instance",
    long_about = "Connects to the SRAT add-on over WebSocket or SSE, merges volume,\n\
        heartbeat and share events into one snapshot and prints it.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Instance profile to use
    #[arg(long, short = 'p', env = "SRAT_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "SRAT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// SRAT host (overrides profile)
    #[arg(long, env = "SRAT_HOST", global = true)]
    pub host: Option<String>,

    /// SRAT port (overrides profile)
    #[arg(long, env = "SRAT_PORT", global = true)]
    pub port: Option<u16>,

    /// Stream transport (overrides profile)
    #[arg(long, short = 't', global = true)]
    pub transport: Option<TransportArg>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TransportArg {
    /// WebSocket at /ws
    #[value(alias = "ws")]
    Websocket,
    /// Server-sent events at /sse
    Sse,
}

impl From<TransportArg> for StreamTransport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Websocket => Self::WebSocket,
            TransportArg::Sse => Self::Sse,
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the merged snapshot as JSON every time it changes
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Print raw frames of the given event types as JSON lines
    #[command(alias = "e")]
    Events(EventsArgs),

    /// Wait for the first full snapshot and print it once
    #[command(alias = "s")]
    Snapshot(SnapshotArgs),

    /// Inspect the configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Single-line JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Event types to print (e.g. hello heartbeat volumes)
    #[arg(required = true, num_args = 1..)]
    pub types: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// How long to wait for volumes and a heartbeat (e.g. "30s", "2m")
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Single-line JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the loaded configuration and the resolved connection
    Show,
}
