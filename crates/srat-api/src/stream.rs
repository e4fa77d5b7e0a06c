//! Event stream with auto-reconnect.
//!
//! Connects to the SRAT backend's push endpoint -- WebSocket `/ws` or SSE
//! `/sse` -- reassembles frames with [`FrameParser`] and dispatches them to
//! the [`ListenerRegistry`]. A single background task per [`EventStream`]
//! owns the connection, the connection state, and every dispatch call.
//!
//! # Example
//!
//! ```rust,ignore
//! use srat_api::{EventStream, StreamConfig, StreamTransport};
//!
//! let url = StreamConfig::endpoint("192.168.1.100", 8099, StreamTransport::WebSocket)?;
//! let stream = EventStream::new(StreamConfig::new(url, StreamTransport::WebSocket));
//!
//! let handle = stream.register_listener("volumes", |disks| {
//!     println!("volumes: {disks}");
//!     Ok(())
//! });
//!
//! stream.start().await;
//! // ...
//! stream.stop().await;
//! handle.unregister();
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use reqwest::header::ACCEPT;
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::frame::{Frame, FrameParser, LineBuffer};
use crate::listener::{ListenerError, ListenerHandle, ListenerRegistry};
use crate::transport::TransportConfig;

const LAST_EVENT_ID: &str = "Last-Event-ID";

// ── StreamTransport ──────────────────────────────────────────────────

/// Which push endpoint to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamTransport {
    /// Bidirectional WebSocket at `/ws`, with ping keep-alive.
    #[default]
    WebSocket,
    /// One-directional server-sent events at `/sse`.
    Sse,
}

impl StreamTransport {
    pub fn path(self) -> &'static str {
        match self {
            Self::WebSocket => "/ws",
            Self::Sse => "/sse",
        }
    }

    fn scheme(self) -> &'static str {
        match self {
            Self::WebSocket => "ws",
            Self::Sse => "http",
        }
    }
}

// ── ReconnectPolicy ──────────────────────────────────────────────────

/// Delay applied before each reconnection attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// Constant delay between attempts.
    Fixed { delay: Duration },
    /// `min(initial * 2^attempt, max)` with +-25% deterministic jitter.
    Exponential { initial: Duration, max: Duration },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed {
            delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => *delay,
            Self::Exponential { initial, max } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let base = initial.as_secs_f64() * 2.0_f64.powi(exponent);
                let capped = base.min(max.as_secs_f64());

                // Deterministic "jitter" seeded from the attempt number.
                let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
                Duration::from_secs_f64((capped * jitter_factor).max(0.0))
            }
        }
    }
}

// ── StreamConfig ─────────────────────────────────────────────────────

/// Everything the run loop needs to (re)connect.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Full endpoint URL, e.g. `ws://192.168.1.100:8099/ws`.
    pub url: Url,
    pub transport: StreamTransport,
    /// Auth header and connect timeout.
    pub handshake: TransportConfig,
    pub reconnect: ReconnectPolicy,
    /// Consecutive failed attempts before giving up. `None` retries forever.
    pub max_retries: Option<u32>,
    /// WebSocket ping interval. Silence for 1.5x this recycles the connection.
    pub heartbeat: Duration,
    /// SSE: longest wait for the next chunk before the stream counts as dead.
    pub idle_timeout: Duration,
}

impl StreamConfig {
    pub fn new(url: Url, transport: StreamTransport) -> Self {
        Self {
            url,
            transport,
            handshake: TransportConfig::default(),
            reconnect: ReconnectPolicy::default(),
            max_retries: None,
            heartbeat: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
        }
    }

    /// Build the endpoint URL for `host:port` and the given transport.
    pub fn endpoint(host: &str, port: u16, transport: StreamTransport) -> Result<Url, Error> {
        let raw = format!("{}://{host}:{port}{}", transport.scheme(), transport.path());
        Ok(Url::parse(&raw)?)
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Retries exhausted or the stream could not be set up at all.
    Failed,
    /// The server refused the stream with a client error. Not retried.
    Rejected { status: u16 },
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed => f.write_str("failed"),
            Self::Rejected { status } => write!(f, "rejected (HTTP {status})"),
        }
    }
}

// ── EventStream ──────────────────────────────────────────────────────

/// Handle to the connection manager.
///
/// Cheaply cloneable. [`start`](Self::start) spawns the run loop and returns
/// immediately; [`stop`](Self::stop) cancels it and waits for it to exit.
/// Dropping the last handle cancels the loop without waiting.
#[derive(Clone)]
pub struct EventStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    config: StreamConfig,
    registry: ListenerRegistry,
    state: Arc<watch::Sender<ConnectionState>>,
    run: Mutex<Option<RunningLoop>>,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for StreamInner {
    fn drop(&mut self) {
        if let Some(run) = self.run.get_mut().take() {
            run.cancel.cancel();
        }
    }
}

impl EventStream {
    /// Create a stream with its own listener registry. Does NOT connect.
    pub fn new(config: StreamConfig) -> Self {
        Self::with_registry(config, ListenerRegistry::new())
    }

    /// Create a stream that dispatches into an existing registry.
    pub fn with_registry(config: StreamConfig, registry: ListenerRegistry) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(StreamInner {
                config,
                registry,
                state: Arc::new(state),
                run: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    /// The registry frames are dispatched into.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.inner.registry
    }

    /// Shorthand for `listeners().register(..)`.
    pub fn register_listener<F>(&self, event_type: impl Into<String>, listener: F) -> ListenerHandle
    where
        F: Fn(&Value) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.inner.registry.register(event_type, listener)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the run loop. No-op while a loop is already running.
    pub async fn start(&self) {
        let mut run = self.inner.run.lock().await;
        if run.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("event stream already running");
            return;
        }

        let cancel = CancellationToken::new();
        self.inner.state.send_replace(ConnectionState::Connecting);

        let ctx = LoopContext {
            config: self.inner.config.clone(),
            registry: self.inner.registry.clone(),
            state: Arc::clone(&self.inner.state),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(stream_loop(ctx));

        *run = Some(RunningLoop { cancel, handle });
    }

    /// Cancel any in-flight connect, read or backoff sleep and wait for the
    /// run loop to exit. Idempotent.
    ///
    /// Once this returns no listener is invoked by this stream until the
    /// next [`start`](Self::start). Must not be awaited from inside a
    /// listener (the listener runs on the loop being awaited).
    pub async fn stop(&self) {
        let running = self.inner.run.lock().await.take();

        if let Some(RunningLoop { cancel, handle }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(error = %e, "event stream loop panicked");
                }
            }
        }

        self.inner.state.send_replace(ConnectionState::Disconnected);
    }

    // ── State observation ────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// `true` only while a connection is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("url", &self.inner.config.url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ── Background reconnection loop ─────────────────────────────────────

struct LoopContext {
    config: StreamConfig,
    registry: ListenerRegistry,
    state: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
}

impl LoopContext {
    fn mark_connected(&self) {
        self.state.send_replace(ConnectionState::Connected);
        info!(url = %self.config.url, "event stream connected");
    }

    fn dispatch(&self, frame: &Frame) {
        let delivered = self.registry.dispatch_frame(frame);
        trace!(event_type = %frame.event_type, delivered, "frame dispatched");
    }
}

/// Main loop: connect → read → on close or error, wait → reconnect.
async fn stream_loop(ctx: LoopContext) {
    let http = match ctx.config.transport {
        StreamTransport::Sse => match ctx.config.handshake.build_http_client() {
            Ok(client) => Some(client),
            Err(e) => {
                error!(error = %e, "cannot build event stream client, giving up");
                ctx.state.send_replace(ConnectionState::Failed);
                return;
            }
        },
        StreamTransport::WebSocket => None,
    };

    let mut attempt: u32 = 0;
    let mut last_event_id: Option<String> = None;

    loop {
        let result = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            result = connect_and_read(&ctx, http.as_ref(), &mut last_event_id) => result,
        };

        // A session that got as far as `Connected` resets the backoff.
        if *ctx.state.borrow() == ConnectionState::Connected {
            attempt = 0;
        }

        match result {
            Ok(()) => info!(url = %ctx.config.url, "event stream closed by server"),
            Err(e) if !e.is_transient() => {
                error!(url = %ctx.config.url, error = %e, "event stream refused, giving up");
                let terminal = match e {
                    Error::StreamRejected { status, .. } => ConnectionState::Rejected { status },
                    _ => ConnectionState::Failed,
                };
                ctx.state.send_replace(terminal);
                return;
            }
            Err(e) => warn!(url = %ctx.config.url, error = %e, attempt, "event stream connection lost"),
        }

        if let Some(max) = ctx.config.max_retries {
            if attempt >= max {
                error!(max_retries = max, "event stream reconnection limit reached, giving up");
                ctx.state.send_replace(ConnectionState::Failed);
                return;
            }
        }

        let delay = ctx.config.reconnect.delay(attempt);
        attempt = attempt.saturating_add(1);
        ctx.state.send_replace(ConnectionState::Reconnecting { attempt });
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    ctx.state.send_replace(ConnectionState::Disconnected);
    debug!("event stream loop exiting");
}

async fn connect_and_read(
    ctx: &LoopContext,
    http: Option<&reqwest::Client>,
    last_event_id: &mut Option<String>,
) -> Result<(), Error> {
    match http {
        Some(client) => read_sse(ctx, client, last_event_id).await,
        None => read_websocket(ctx).await,
    }
}

fn timeout_error(limit: Duration, during: &'static str) -> Error {
    Error::Timeout {
        timeout_secs: limit.as_secs(),
        during,
    }
}

// ── WebSocket session ────────────────────────────────────────────────

/// An HTTP answer to the upgrade request is a refusal, like a non-2xx SSE
/// response.
fn handshake_error(err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status().as_u16();
            let message = response
                .into_body()
                .map(|body| String::from_utf8_lossy(&body).into_owned())
                .unwrap_or_default();
            Error::StreamRejected { status, message }
        }
        other => Error::WebSocketConnect(other.to_string()),
    }
}

/// One WebSocket session: every text message carries one or more
/// SSE-formatted blocks.
async fn read_websocket(ctx: &LoopContext) -> Result<(), Error> {
    let url = &ctx.config.url;
    let connect_timeout = ctx.config.handshake.connect_timeout;
    let request = ctx.config.handshake.websocket_request(url)?;

    info!(url = %url, "connecting to event stream (WebSocket)");

    let (ws_stream, _response) =
        tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| timeout_error(connect_timeout, "connecting"))?
            .map_err(handshake_error)?;

    ctx.mark_connected();

    let (mut write, mut read) = ws_stream.split();
    let mut parser = FrameParser::new();

    let heartbeat = ctx.config.heartbeat.max(Duration::from_secs(1));
    let stale_after = heartbeat + heartbeat / 2;
    let mut ping = tokio::time::interval(heartbeat);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            message = read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        for frame in parser.parse_block(&text) {
                            ctx.dispatch(&frame);
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // tungstenite answers pings on its own
                        last_seen = Instant::now();
                        trace!("WebSocket keep-alive");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let Some(cf) = frame else {
                            info!("WebSocket close frame received (no payload)");
                            return Ok(());
                        };
                        info!(code = %cf.code, reason = %cf.reason, "WebSocket close frame received");
                        if cf.code == CloseCode::Normal {
                            return Ok(());
                        }
                        return Err(Error::WebSocketClosed {
                            code: u16::from(cf.code),
                            reason: cf.reason.to_string(),
                        });
                    }
                    Some(Ok(_)) => {
                        last_seen = Instant::now();
                        debug!("ignoring non-text WebSocket message");
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        info!("WebSocket stream ended");
                        return Ok(());
                    }
                }
            }
            _ = ping.tick() => {
                if last_seen.elapsed() > stale_after {
                    return Err(timeout_error(stale_after, "waiting for keep-alive"));
                }
                write
                    .send(Message::Ping(Bytes::new()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
        }
    }
}

// ── SSE session ──────────────────────────────────────────────────────

/// One SSE session. However the body ends (EOF, broken transfer, idle
/// timeout) the trailing unterminated frame is flushed first.
async fn read_sse(
    ctx: &LoopContext,
    client: &reqwest::Client,
    last_event_id: &mut Option<String>,
) -> Result<(), Error> {
    let url = &ctx.config.url;
    let connect_timeout = ctx.config.handshake.connect_timeout;
    let idle_timeout = ctx.config.idle_timeout;

    info!(url = %url, resume_from = last_event_id.as_deref(), "connecting to event stream (SSE)");

    let mut request = client.get(url.clone()).header(ACCEPT, "text/event-stream");
    if let Some(id) = last_event_id.as_deref() {
        request = request.header(LAST_EVENT_ID, id);
    }

    let response = tokio::time::timeout(connect_timeout, request.send())
        .await
        .map_err(|_| timeout_error(connect_timeout, "connecting"))??;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = tokio::time::timeout(connect_timeout, response.text())
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default();
        return Err(Error::StreamRejected { status, message });
    }

    ctx.mark_connected();

    let mut body = response.bytes_stream();
    let mut lines = LineBuffer::new();
    let mut parser = FrameParser::new();

    let outcome = loop {
        let Ok(chunk) = tokio::time::timeout(idle_timeout, body.next()).await else {
            break Err(timeout_error(idle_timeout, "reading"));
        };

        match chunk {
            Some(Ok(bytes)) => {
                for line in lines.push(&bytes) {
                    if let Some(frame) = parser.push_line(&line) {
                        ctx.dispatch(&frame);
                    }
                }
                remember_id(&parser, last_event_id);
            }
            Some(Err(e)) => break Err(Error::StreamRead(e.to_string())),
            None => break Ok(()),
        }
    };

    flush_pending(ctx, &mut lines, &mut parser);
    remember_id(&parser, last_event_id);
    if outcome.is_ok() {
        info!("SSE stream ended");
    }
    outcome
}

/// Dispatch whatever the body left behind: the bytes after the last newline
/// and a frame still missing its blank terminator.
fn flush_pending(ctx: &LoopContext, lines: &mut LineBuffer, parser: &mut FrameParser) {
    if let Some(rest) = lines.take_remainder() {
        if let Some(frame) = parser.push_line(&rest) {
            ctx.dispatch(&frame);
        }
    }
    if let Some(frame) = parser.finish() {
        ctx.dispatch(&frame);
    }
}

fn remember_id(parser: &FrameParser, last_event_id: &mut Option<String>) {
    if let Some(id) = parser.last_id() {
        if last_event_id.as_deref() != Some(id) {
            *last_event_id = Some(id.to_owned());
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_fixed_five_seconds() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(5));
        assert_eq!(policy.delay(7), Duration::from_secs(5));
    }

    #[test]
    fn exponential_backoff_grows() {
        let policy = ReconnectPolicy::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        };

        let d0 = policy.delay(0);
        let d1 = policy.delay(1);
        let d2 = policy.delay(2);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn exponential_backoff_caps_at_max() {
        let policy = ReconnectPolicy::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
        };

        // With jitter factor up to 1.25, max effective is 12.5s
        let d10 = policy.delay(10);
        assert!(d10 <= Duration::from_secs(13), "delay ({d10:?}) should be capped");
        assert!(policy.delay(u32::MAX) <= Duration::from_secs(13));
    }

    #[test]
    fn endpoint_urls() {
        let ws = StreamConfig::endpoint("192.168.1.100", 8099, StreamTransport::WebSocket).unwrap();
        assert_eq!(ws.as_str(), "ws://192.168.1.100:8099/ws");

        let sse = StreamConfig::endpoint("srat.local", 3000, StreamTransport::Sse).unwrap();
        assert_eq!(sse.as_str(), "http://srat.local:3000/sse");
    }

    #[test]
    fn endpoint_rejects_garbage_host() {
        assert!(StreamConfig::endpoint("bad host", 80, StreamTransport::Sse).is_err());
    }

    #[test]
    fn connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 3 }.to_string(),
            "reconnecting (attempt 3)"
        );
        assert_eq!(
            ConnectionState::Rejected { status: 401 }.to_string(),
            "rejected (HTTP 401)"
        );
    }

    #[tokio::test]
    async fn new_stream_is_disconnected() {
        let url = StreamConfig::endpoint("127.0.0.1", 9, StreamTransport::WebSocket).unwrap();
        let stream = EventStream::new(StreamConfig::new(url, StreamTransport::WebSocket));

        assert_eq!(stream.state(), ConnectionState::Disconnected);
        assert!(!stream.is_connected());

        // stop() before start() is harmless
        stream.stop().await;
        assert_eq!(stream.state(), ConnectionState::Disconnected);
    }
}
