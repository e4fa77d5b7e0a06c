use thiserror::Error;

/// Top-level error type for the `srat-api` crate.
///
/// None of these escape the reconnect loop. Transient ones are logged there
/// and turned into a retry; the rest end the loop in a terminal
/// `ConnectionState`. They surface to callers as values only from setup
/// paths (URL building, HTTP client construction).
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Connect or read timed out.
    #[error("Timed out after {timeout_secs}s while {during}")]
    Timeout {
        timeout_secs: u64,
        during: &'static str,
    },

    /// Building the HTTP client failed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Event stream ────────────────────────────────────────────────
    /// The endpoint answered the SSE request or WebSocket upgrade with a
    /// non-success status.
    #[error("Event stream rejected (HTTP {status}): {message}")]
    StreamRejected { status: u16, message: String },

    /// SSE stream broke mid-read.
    #[error("Event stream read failed: {0}")]
    StreamRead(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
            Self::Timeout { .. }
            | Self::StreamRead(_)
            | Self::WebSocketConnect(_)
            | Self::WebSocketClosed { .. } => true,
            Self::StreamRejected { status, .. } => *status >= 500,
            Self::InvalidUrl(_) | Self::ClientBuild(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_socket_failures_are_transient() {
        assert!(
            Error::Timeout {
                timeout_secs: 30,
                during: "connecting"
            }
            .is_transient()
        );
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(Error::StreamRead("reset".into()).is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        let rejected = Error::StreamRejected {
            status: 401,
            message: "missing X-Remote-User-Id".into(),
        };
        assert!(!rejected.is_transient());
        assert!(!Error::ClientBuild("bad tls".into()).is_transient());

        let unavailable = Error::StreamRejected {
            status: 503,
            message: String::new(),
        };
        assert!(unavailable.is_transient());
    }
}
