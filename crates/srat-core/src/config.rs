// ── Runtime connection configuration ──
//
// Describes *how* to reach one SRAT instance. Never touches disk: the CLI
// (or any other host) builds a `ClientConfig` and hands it in.

use std::time::Duration;

use srat_api::transport::{DEFAULT_USER_ID, TransportConfig};
use srat_api::{ReconnectPolicy, StreamConfig, StreamTransport};

use crate::error::CoreError;

/// Default port of the SRAT add-on.
pub const DEFAULT_PORT: u16 = 8099;

/// Configuration for connecting to a single SRAT instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hostname or IP address, e.g. `192.168.1.100`.
    pub host: String,
    pub port: u16,
    /// WebSocket (`/ws`) or SSE (`/sse`).
    pub transport: StreamTransport,
    /// Value for the `X-Remote-User-Id` header.
    pub user_id: String,
    pub reconnect: ReconnectPolicy,
    /// Give up after this many consecutive failed attempts. `None` = never.
    pub max_retries: Option<u32>,
    pub connect_timeout: Duration,
    /// WebSocket ping interval.
    pub heartbeat: Duration,
    /// SSE read idle timeout.
    pub idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            transport: StreamTransport::default(),
            user_id: DEFAULT_USER_ID.into(),
            reconnect: ReconnectPolicy::default(),
            max_retries: None,
            connect_timeout: Duration::from_secs(30),
            heartbeat: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Translate into the transport-level stream configuration.
    pub fn stream_config(&self) -> Result<StreamConfig, CoreError> {
        if self.host.trim().is_empty() {
            return Err(CoreError::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(CoreError::config("port must be non-zero"));
        }

        let url = StreamConfig::endpoint(&self.host, self.port, self.transport)
            .map_err(|e| CoreError::config(e.to_string()))?;
        let mut config = StreamConfig::new(url, self.transport);
        config.handshake = TransportConfig {
            user_id: self.user_id.clone(),
            connect_timeout: self.connect_timeout,
        };
        config.reconnect = self.reconnect.clone();
        config.max_retries = self.max_retries;
        config.heartbeat = self.heartbeat;
        config.idle_timeout = self.idle_timeout;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_srat_addon() {
        let config = ClientConfig::default();
        assert_eq!(config.port, 8099);
        assert_eq!(config.user_id, "homeassistant");
        assert_eq!(config.transport, StreamTransport::WebSocket);
        assert_eq!(config.reconnect.delay(0), Duration::from_secs(5));
    }

    #[test]
    fn stream_config_carries_every_setting() {
        let config = ClientConfig {
            transport: StreamTransport::Sse,
            user_id: "admin".into(),
            max_retries: Some(3),
            heartbeat: Duration::from_secs(10),
            ..ClientConfig::new("192.168.1.100", 8099)
        };

        let stream = config.stream_config().unwrap();
        assert_eq!(stream.url.as_str(), "http://192.168.1.100:8099/sse");
        assert_eq!(stream.handshake.user_id, "admin");
        assert_eq!(stream.max_retries, Some(3));
        assert_eq!(stream.heartbeat, Duration::from_secs(10));
    }

    #[test]
    fn empty_host_is_rejected() {
        let config = ClientConfig::new("  ", 8099);
        assert!(matches!(config.stream_config(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn zero_port_is_rejected() {
        let config = ClientConfig::new("srat.local", 0);
        assert!(matches!(config.stream_config(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn unparseable_host_is_config_error() {
        let config = ClientConfig::new("bad host", 8099);
        match config.stream_config() {
            Err(CoreError::Config { message }) => assert!(message.contains("URL"), "{message}"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
