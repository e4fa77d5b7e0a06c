// ── SRAT client ──
//
// Wires one `EventStream` to one `StateCoordinator` over a shared listener
// registry. This is the surface hosts use: connect, observe the snapshot,
// optionally tap raw events, disconnect.

use std::sync::Arc;

use serde_json::Value;
use srat_api::{ConnectionState, EventStream, ListenerError, ListenerHandle, ListenerRegistry};
use tokio::sync::watch;
use tracing::info;

use crate::config::ClientConfig;
use crate::coordinator::StateCoordinator;
use crate::error::CoreError;
use crate::snapshot::{SnapshotStream, StateSnapshot};

/// The main entry point for consumers.
///
/// Cheaply cloneable. Construction validates the configuration but does not
/// connect; call [`connect`](Self::connect) to start the background stream.
#[derive(Clone, Debug)]
pub struct SratClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    stream: EventStream,
    coordinator: StateCoordinator,
}

impl SratClient {
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let stream_config = config.stream_config()?;
        let registry = ListenerRegistry::new();
        let coordinator = StateCoordinator::attach(&registry);
        let stream = EventStream::with_registry(stream_config, registry);

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                stream,
                coordinator,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Endpoint URL the stream connects to.
    pub fn endpoint(&self) -> &url::Url {
        &self.inner.stream.config().url
    }

    pub fn coordinator(&self) -> &StateCoordinator {
        &self.inner.coordinator
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Start the background event stream. Returns immediately; watch
    /// [`connection_state`](Self::connection_state) for progress.
    pub async fn connect(&self) -> Result<(), CoreError> {
        if self.inner.coordinator.is_shut_down() {
            return Err(CoreError::ShutDown);
        }
        info!(url = %self.endpoint(), "starting SRAT event stream");
        self.inner.stream.start().await;
        Ok(())
    }

    /// Stop the event stream and wait for it to wind down. The snapshot is
    /// kept; `connect` may be called again.
    pub async fn disconnect(&self) {
        self.inner.stream.stop().await;
        info!("SRAT event stream stopped");
    }

    /// Disconnect and detach the coordinator for good.
    pub async fn shutdown(&self) {
        self.disconnect().await;
        self.inner.coordinator.shutdown();
    }

    // ── Raw event access ─────────────────────────────────────────────

    /// Register a listener for any event type, including those the
    /// coordinator does not consume (`hello`, `updating`, `error`, ...).
    pub fn register_listener<F>(&self, event_type: impl Into<String>, listener: F) -> ListenerHandle
    where
        F: Fn(&Value) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.inner.stream.register_listener(event_type, listener)
    }

    // ── State observation ────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        self.inner.stream.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.stream.state()
    }

    pub fn subscribe_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.stream.subscribe_state()
    }

    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        self.inner.coordinator.snapshot()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        self.inner.coordinator.subscribe()
    }
}
