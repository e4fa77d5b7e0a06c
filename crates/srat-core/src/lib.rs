// srat-core: Reactive state layer between srat-api and consumers (CLI, integrations).

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod snapshot;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::SratClient;
pub use config::ClientConfig;
pub use coordinator::StateCoordinator;
pub use error::CoreError;
pub use snapshot::{SnapshotStream, SnapshotWatchStream, StateSnapshot};

pub use model::{
    Disk, DiskHealth, EventKind, Heartbeat, ProcessStatus, SambaStatus, ServerStatus,
    ShareResource, SratEvent,
};

// Transport types consumers need without depending on srat-api directly.
pub use srat_api::{ConnectionState, ListenerError, ListenerHandle, ReconnectPolicy, StreamTransport};
