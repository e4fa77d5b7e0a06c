// ── SRAT domain model ──
//
// Typed views of the event payloads the backend pushes. Every field is
// optional: the backend omits whatever it does not know, and newer backends
// add fields that older clients keep in `extra`. A field whose value has
// the wrong type reads as unset instead of failing the whole payload.

pub mod event;
pub mod health;
pub mod share;
pub mod volume;

// ── Re-exports ──────────────────────────────────────────────────────

pub use event::{EventKind, Heartbeat, SratEvent};
pub use health::{
    DiskHealth, DiskIoStats, GlobalDiskStats, ProcessStatus, SambaProcessStatus, SambaSession,
    SambaStatus, SambaTcon, ServerStatus,
};
pub use share::{ShareResource, ShareUser};
pub use volume::{Disk, MountPoint, Partition};

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// `deserialize_with` for optional fields: `null` or an off-type value
/// becomes `None`.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(T::deserialize(&value)
        .inspect_err(|e| tracing::trace!(error = %e, "off-type field ignored"))
        .ok())
}

/// `deserialize_with` for optional lists: elements that do not decode are
/// skipped, anything but an array becomes `None`.
pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_array().map(|items| array_elements(items)))
}

/// `deserialize_with` for optional keyed maps: entries that do not decode are
/// skipped, anything but an object becomes `None`.
pub(crate) fn lenient_map<'de, D, T>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_object().map(object_entries))
}

pub(crate) fn array_elements<T: DeserializeOwned>(items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| {
            T::deserialize(item)
                .inspect_err(|e| tracing::debug!(error = %e, "list element skipped"))
                .ok()
        })
        .collect()
}

pub(crate) fn object_entries<T: DeserializeOwned>(
    object: &Map<String, Value>,
) -> BTreeMap<String, T> {
    object
        .iter()
        .filter_map(|(key, item)| {
            T::deserialize(item)
                .inspect_err(|e| tracing::debug!(key = %key, error = %e, "map entry skipped"))
                .ok()
                .map(|decoded| (key.clone(), decoded))
        })
        .collect()
}
