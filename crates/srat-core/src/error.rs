// ── Core error types ──
//
// The event stream never returns transport errors to callers: they turn into
// reconnects or a terminal `ConnectionState`. What reaches a caller as a value
// is a setup problem or use after shutdown.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("State coordinator has been shut down")]
    ShutDown,
}

impl CoreError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
