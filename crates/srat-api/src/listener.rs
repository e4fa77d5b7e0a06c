// ── Listener registry and event dispatch ──
//
// Event-type → ordered subscriber lists. Dispatch decodes the JSON payload
// once and hands the same `Value` to every listener, isolating failures.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{error, trace, warn};

use crate::frame::Frame;

/// Error type listeners return to report a failure to the dispatcher.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type ListenerFn = dyn Fn(&Value) -> Result<(), ListenerError> + Send + Sync;

#[derive(Clone)]
struct Entry {
    id: u64,
    listener: Arc<ListenerFn>,
}

#[derive(Default)]
struct RegistryInner {
    listeners: DashMap<String, Vec<Entry>>,
    next_id: AtomicU64,
}

impl RegistryInner {
    fn remove(&self, event_type: &str, id: u64) {
        let now_empty = match self.listeners.get_mut(event_type) {
            Some(mut list) => {
                list.retain(|e| e.id != id);
                list.is_empty()
            }
            None => return,
        };

        if now_empty {
            self.listeners.remove_if(event_type, |_, list| list.is_empty());
        }
    }
}

// ── ListenerRegistry ─────────────────────────────────────────────────

/// Instance-scoped listener registry.
///
/// Cheaply cloneable; clones share the same listener table. Registration and
/// dispatch may race freely: dispatch iterates over a copy of the list, so a
/// listener may (un)register others, including itself, while it runs.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` to the list for `event_type`.
    ///
    /// The returned handle removes exactly this listener, even if an
    /// identical closure is registered more than once.
    pub fn register<F>(&self, event_type: impl Into<String>, listener: F) -> ListenerHandle
    where
        F: Fn(&Value) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        self.inner
            .listeners
            .entry(event_type.clone())
            .or_default()
            .push(Entry {
                id,
                listener: Arc::new(listener),
            });

        trace!(%event_type, id, "listener registered");

        ListenerHandle {
            registry: Arc::downgrade(&self.inner),
            event_type,
            id,
        }
    }

    /// Dispatch a parsed frame.
    pub fn dispatch_frame(&self, frame: &Frame) -> usize {
        self.dispatch(&frame.event_type, &frame.data)
    }

    /// Decode `raw` as JSON and invoke every listener for `event_type`.
    ///
    /// Malformed JSON is logged and reaches no listener. An empty payload is
    /// treated as `{}`. Returns the number of listeners that completed
    /// without error.
    pub fn dispatch(&self, event_type: &str, raw: &str) -> usize {
        let payload = if raw.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            match serde_json::from_str::<Value>(raw) {
                Ok(v) => v,
                Err(e) => {
                    warn!(event_type, error = %e, "failed to parse event payload, skipping");
                    return 0;
                }
            }
        };

        self.dispatch_value(event_type, &payload)
    }

    /// Invoke every listener for `event_type` with an already-decoded payload.
    pub fn dispatch_value(&self, event_type: &str, payload: &Value) -> usize {
        let entries: Vec<Entry> = match self.inner.listeners.get(event_type) {
            Some(list) => list.clone(),
            None => {
                trace!(event_type, "no listeners for event");
                return 0;
            }
        };

        let mut delivered = 0;
        for entry in entries {
            let listener = Arc::clone(&entry.listener);
            match panic::catch_unwind(AssertUnwindSafe(|| listener(payload))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(event_type, listener = entry.id, error = %e, "event listener failed");
                }
                Err(cause) => {
                    error!(
                        event_type,
                        listener = entry.id,
                        panic = panic_message(cause.as_ref()),
                        "event listener panicked"
                    );
                }
            }
        }
        delivered
    }

    /// Number of listeners currently registered for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner.listeners.get(event_type).map_or(0, |l| l.len())
    }

    /// Event types that currently have at least one listener.
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .inner
            .listeners
            .iter()
            .map(|r| r.key().clone())
            .collect();
        types.sort();
        types
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("event_types", &self.event_types())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

// ── ListenerHandle ───────────────────────────────────────────────────

/// Capability to remove one registered listener.
///
/// Dropping the handle leaves the listener registered.
#[derive(Debug)]
#[must_use = "dropping the handle keeps the listener registered forever"]
pub struct ListenerHandle {
    registry: Weak<RegistryInner>,
    event_type: String,
    id: u64,
}

impl ListenerHandle {
    /// Remove the listener. A no-op if it is already gone or the registry
    /// has been dropped.
    pub fn unregister(self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.remove(&self.event_type, self.id);
            trace!(event_type = %self.event_type, id = self.id, "listener unregistered");
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    type Boxed = Box<dyn Fn(&Value) -> Result<(), ListenerError> + Send + Sync>;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Boxed) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for_factory = Arc::clone(&log);
        let factory = move |name: &str| -> Boxed {
            let log = Arc::clone(&log_for_factory);
            let name = name.to_owned();
            Box::new(move |_: &Value| -> Result<(), ListenerError> {
                log.lock().unwrap().push(name.clone());
                Ok(())
            })
        };
        (log, factory)
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let registry = ListenerRegistry::new();
        let (log, make) = recorder();

        let first = registry.register("volumes", make("first"));
        let _second = registry.register("volumes", make("second"));

        assert_eq!(registry.dispatch("volumes", "[]"), 2);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);

        first.unregister();
        log.lock().unwrap().clear();

        assert_eq!(registry.dispatch("volumes", "[]"), 1);
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn malformed_json_reaches_no_listener() {
        let registry = ListenerRegistry::new();
        let (log, make) = recorder();
        let _h = registry.register("heartbeat", make("hb"));

        assert_eq!(registry.dispatch("heartbeat", "{not json"), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_payload_is_empty_object() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_in = Arc::clone(&seen);
        let _h = registry.register("hello", move |v: &Value| {
            *seen_in.lock().unwrap() = Some(v.clone());
            Ok(())
        });

        registry.dispatch("hello", "");
        assert_eq!(seen.lock().unwrap().clone(), Some(json!({})));
    }

    #[test]
    fn failing_listener_does_not_stop_others() {
        let registry = ListenerRegistry::new();
        let (log, make) = recorder();

        let _a = registry.register("volumes", |_: &Value| Err("boom".into()));
        let _b = registry.register("volumes", |_: &Value| -> Result<(), ListenerError> {
            panic!("listener bug")
        });
        let _c = registry.register("volumes", make("survivor"));

        assert_eq!(registry.dispatch("volumes", "[]"), 1);
        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
    }

    #[test]
    fn identical_listeners_are_removed_by_identity() {
        let registry = ListenerRegistry::new();
        let (log, make) = recorder();

        let a = registry.register("shares", make("same"));
        let _b = registry.register("shares", make("same"));
        a.unregister();

        assert_eq!(registry.listener_count("shares"), 1);
        registry.dispatch("shares", "[]");
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn unregister_twice_or_after_removal_is_noop() {
        let registry = ListenerRegistry::new();
        let handle = registry.register("volumes", |_: &Value| Ok(()));
        let stale = ListenerHandle {
            registry: Arc::downgrade(&registry.inner),
            event_type: "never-used".into(),
            id: 999,
        };

        handle.unregister();
        stale.unregister();
        assert_eq!(registry.listener_count("volumes"), 0);
        assert!(registry.event_types().is_empty());
    }

    #[test]
    fn unregister_after_registry_dropped() {
        let registry = ListenerRegistry::new();
        let handle = registry.register("volumes", |_: &Value| Ok(()));
        drop(registry);
        handle.unregister();
    }

    #[test]
    fn listener_may_unregister_itself_during_dispatch() {
        let registry = ListenerRegistry::new();
        let slot: Arc<Mutex<Option<ListenerHandle>>> = Arc::new(Mutex::new(None));
        let slot_in = Arc::clone(&slot);

        let handle = registry.register("hello", move |_: &Value| {
            if let Some(h) = slot_in.lock().unwrap().take() {
                h.unregister();
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(handle);

        assert_eq!(registry.dispatch("hello", "{}"), 1);
        assert_eq!(registry.listener_count("hello"), 0);
        assert_eq!(registry.dispatch("hello", "{}"), 0);
    }

    #[test]
    fn dispatch_without_listeners() {
        let registry = ListenerRegistry::new();
        assert_eq!(registry.dispatch("unknown", "{}"), 0);
    }

    #[test]
    fn dispatch_frame_uses_frame_fields() {
        let registry = ListenerRegistry::new();
        let (log, make) = recorder();
        let _h = registry.register("volumes", make("v"));

        let frame = Frame {
            event_type: "volumes".into(),
            data: "[]".into(),
            id: Some("1".into()),
        };
        assert_eq!(registry.dispatch_frame(&frame), 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
