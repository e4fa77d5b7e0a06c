// ── State coordinator ──
//
// Owns the single `StateSnapshot` of one SRAT instance. Listens for the
// known event types on a `ListenerRegistry`, merges each payload into a copy
// of the current snapshot and publishes the copy. Purely reactive: it never
// performs I/O.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde_json::Value;
use srat_api::{ListenerHandle, ListenerRegistry};
use strum::IntoEnumIterator;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{EventKind, Heartbeat, SratEvent};
use crate::snapshot::{SnapshotStream, StateSnapshot};

/// Merges event payloads into a published [`StateSnapshot`].
///
/// Cheaply cloneable. Each applied event produces exactly one publish,
/// synchronously, before `apply` returns.
#[derive(Clone)]
pub struct StateCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    snapshot: watch::Sender<Arc<StateSnapshot>>,
    handles: Mutex<Vec<ListenerHandle>>,
    shut_down: AtomicBool,
}

impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        let handles = self.handles.get_mut().unwrap_or_else(PoisonError::into_inner);
        for handle in std::mem::take(handles) {
            handle.unregister();
        }
    }
}

impl Default for StateCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCoordinator {
    /// A coordinator with every field unset, not listening to anything.
    /// Feed it with [`apply`](Self::apply) or use [`attach`](Self::attach).
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(StateSnapshot::default()));
        Self {
            inner: Arc::new(CoordinatorInner {
                snapshot,
                handles: Mutex::new(Vec::new()),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Create a coordinator and register it for `volumes`, `heartbeat` and
    /// `shares` on `registry`.
    pub fn attach(registry: &ListenerRegistry) -> Self {
        let coordinator = Self::new();

        let handles: Vec<ListenerHandle> = EventKind::iter()
            .map(|kind| {
                let weak = Arc::downgrade(&coordinator.inner);
                registry.register(kind.as_ref(), move |payload: &Value| {
                    if let Some(inner) = weak.upgrade() {
                        StateCoordinator { inner }.apply_payload(kind, payload)?;
                    }
                    Ok(())
                })
            })
            .collect();

        debug!(listeners = handles.len(), "state coordinator attached");
        *coordinator.lock_handles() = handles;
        coordinator
    }

    // ── Merging ──────────────────────────────────────────────────────

    /// Decode and merge a raw payload. Unknown event types are ignored.
    ///
    /// Returns whether a new snapshot was published.
    pub fn handle(&self, event_type: &str, payload: &Value) -> Result<bool, CoreError> {
        match SratEvent::decode(event_type, payload) {
            Some(event) => self.apply(event),
            None => Ok(false),
        }
    }

    fn apply_payload(&self, kind: EventKind, payload: &Value) -> Result<bool, CoreError> {
        self.apply(SratEvent::decode_kind(kind, payload))
    }

    /// Merge one decoded event.
    ///
    /// - `Volumes` / `Shares` replace their field wholesale; a malformed
    ///   payload unsets the field.
    /// - `Heartbeat` replaces each heartbeat section independently and never
    ///   touches `disks`; a malformed (non-object) heartbeat is ignored.
    ///
    /// Returns whether a new snapshot was published.
    pub fn apply(&self, event: SratEvent) -> Result<bool, CoreError> {
        if self.is_shut_down() {
            return Err(CoreError::ShutDown);
        }

        let kind = event.kind();
        let mut published = false;
        self.inner.snapshot.send_if_modified(|current| {
            let mut next = StateSnapshot::clone(current);
            if !merge(&mut next, event) {
                return false;
            }
            next.last_event_at = Some(Utc::now());
            *current = Arc::new(next);
            published = true;
            true
        });

        if published {
            debug!(%kind, "snapshot updated");
        }
        Ok(published)
    }

    // ── Observation ──────────────────────────────────────────────────

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        self.inner.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.snapshot.subscribe())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Unregister every listener and reject further merges. Idempotent.
    /// Subscribers keep the last snapshot.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let handles = std::mem::take(&mut *self.lock_handles());
        for handle in handles {
            handle.unregister();
        }
        info!("state coordinator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, Vec<ListenerHandle>> {
        self.inner
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for StateCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCoordinator")
            .field("shut_down", &self.is_shut_down())
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// Apply the merge rule for `event` to `next`. Returns `false` when the
/// event leaves the snapshot untouched.
fn merge(next: &mut StateSnapshot, event: SratEvent) -> bool {
    match event {
        SratEvent::Volumes(disks) => {
            next.disks = Some(Arc::new(disks));
        }
        SratEvent::Shares(shares) => {
            next.shares = Some(Arc::new(shares));
        }
        SratEvent::Heartbeat(heartbeat) => {
            let Heartbeat {
                samba_status,
                process_status,
                disk_health,
                server,
            } = *heartbeat;
            next.samba_status = samba_status.map(Arc::new);
            next.process_status = process_status.map(Arc::new);
            next.disk_health = disk_health.map(Arc::new);
            next.server = server.map(Arc::new);
        }
        SratEvent::Malformed { kind, reason } => match kind {
            EventKind::Volumes => {
                warn!(%kind, %reason, "malformed payload, clearing disks");
                next.disks = None;
            }
            EventKind::Shares => {
                warn!(%kind, %reason, "malformed payload, clearing shares");
                next.shares = None;
            }
            EventKind::Heartbeat => {
                warn!(%kind, %reason, "malformed heartbeat ignored");
                return false;
            }
        },
    }
    true
}
