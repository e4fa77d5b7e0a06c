// ── State snapshot and subscriptions ──
//
// The coordinator publishes an immutable `Arc<StateSnapshot>` on a watch
// channel after every applied event. `SnapshotStream` gives both
// point-in-time access and change notification.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::Serialize;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::{Disk, DiskHealth, SambaProcessStatus, SambaStatus, ServerStatus, ShareResource};

/// Last known state of one SRAT instance.
///
/// `None` means unset: never received, or invalidated by a payload of the
/// wrong shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub disks: Option<Arc<Vec<Disk>>>,
    pub samba_status: Option<Arc<SambaStatus>>,
    pub process_status: Option<Arc<SambaProcessStatus>>,
    pub disk_health: Option<Arc<DiskHealth>>,
    pub shares: Option<Arc<Vec<ShareResource>>>,
    pub server: Option<Arc<ServerStatus>>,

    /// When the last event was merged into this snapshot.
    pub last_event_at: Option<DateTime<Utc>>,
}

impl StateSnapshot {
    /// `true` while no field has ever been set.
    pub fn is_empty(&self) -> bool {
        self.disks.is_none()
            && self.samba_status.is_none()
            && self.process_status.is_none()
            && self.disk_health.is_none()
            && self.shares.is_none()
            && self.server.is_none()
    }

    pub fn has_volumes(&self) -> bool {
        self.disks.is_some()
    }

    /// `true` once any heartbeat section has been received.
    pub fn has_heartbeat(&self) -> bool {
        self.samba_status.is_some()
            || self.process_status.is_some()
            || self.disk_health.is_some()
            || self.server.is_some()
    }

    pub fn disks(&self) -> &[Disk] {
        self.disks.as_deref().map_or(&[], Vec::as_slice)
    }

    pub fn shares(&self) -> &[ShareResource] {
        self.shares.as_deref().map_or(&[], Vec::as_slice)
    }
}

// ── SnapshotStream ──────────────────────────────────────────────────

/// A subscription to the coordinator's snapshot.
///
/// Provides both point-in-time access and reactive change notification via
/// [`changed`](Self::changed) or by converting to a `Stream`.
pub struct SnapshotStream {
    current: Arc<StateSnapshot>,
    receiver: watch::Receiver<Arc<StateSnapshot>>,
}

impl SnapshotStream {
    pub(crate) fn new(mut receiver: watch::Receiver<Arc<StateSnapshot>>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time or by the last `changed()`.
    pub fn current(&self) -> &Arc<StateSnapshot> {
        &self.current
    }

    /// The latest published snapshot (may have changed since `current`).
    pub fn latest(&self) -> Arc<StateSnapshot> {
        self.receiver.borrow().clone()
    }

    /// `true` if a snapshot was published since `current` was captured.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next publish, returning the new snapshot.
    /// Returns `None` once the coordinator has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<StateSnapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The stream yields the current snapshot first, then every change.
    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct SnapshotWatchStream {
    inner: WatchStream<Arc<StateSnapshot>>,
}

impl Stream for SnapshotWatchStream {
    type Item = Arc<StateSnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_empty() {
        let snap = StateSnapshot::default();
        assert!(snap.is_empty());
        assert!(!snap.has_volumes());
        assert!(!snap.has_heartbeat());
        assert!(snap.disks().is_empty());
        assert!(snap.last_event_at.is_none());
    }

    #[test]
    fn unset_fields_serialize_as_null() {
        let json = serde_json::to_value(StateSnapshot::default()).unwrap();
        assert_eq!(json["disks"], serde_json::Value::Null);
        assert_eq!(json["server"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn changed_tracks_latest() {
        let (tx, rx) = watch::channel(Arc::new(StateSnapshot::default()));
        let mut stream = SnapshotStream::new(rx);
        assert!(stream.current().is_empty());

        let next = StateSnapshot {
            server: Some(Arc::new(ServerStatus {
                alive: Some(true),
                ..ServerStatus::default()
            })),
            ..StateSnapshot::default()
        };
        tx.send_replace(Arc::new(next));

        let seen = stream.changed().await.unwrap();
        assert!(seen.has_heartbeat());
        assert!(stream.current().has_heartbeat());

        drop(tx);
        assert!(stream.changed().await.is_none());
    }
}
