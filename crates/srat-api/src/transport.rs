// Shared transport configuration for the event-stream connections.
//
// Both transports attach the same authentication header and honour the
// same connect timeout. The SSE transport builds its reqwest::Client here;
// the WebSocket transport builds its upgrade request here.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use url::Url;

use crate::error::Error;

/// Header the SRAT backend's Home Assistant middleware authenticates on.
pub const AUTH_HEADER: &str = "X-Remote-User-Id";

/// Default value sent in [`AUTH_HEADER`].
pub const DEFAULT_USER_ID: &str = "homeassistant";

/// Handshake settings shared by both transports.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Value for the `X-Remote-User-Id` header.
    pub user_id: String,
    /// Bound on establishing the connection (TCP + HTTP/upgrade handshake).
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.into(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` for the SSE endpoint.
    ///
    /// No overall request timeout: the response body is an endless stream.
    /// Reads are bounded by the stream loop's idle timeout instead.
    pub fn build_http_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-remote-user-id"),
            HeaderValue::from_str(&self.user_id)
                .map_err(|e| Error::ClientBuild(format!("invalid user id header: {e}")))?,
        );

        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("srat-api/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }

    /// Build the WebSocket upgrade request with the auth header attached.
    pub fn websocket_request(&self, url: &Url) -> Result<ClientRequestBuilder, Error> {
        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

        Ok(ClientRequestBuilder::new(uri).with_header(AUTH_HEADER, self.user_id.clone()))
    }
}
