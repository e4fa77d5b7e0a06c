// ── Typed event payloads ──
//
// Raw `(event_type, Value)` pairs from the dispatcher are decoded into a
// `SratEvent` before the coordinator merges them. The variant is chosen by
// JSON shape alone (array for `volumes`/`shares`, object for `heartbeat`);
// field types inside never make a payload malformed. A payload of the wrong
// shape becomes `Malformed` rather than an error: the merge rule decides
// what a malformed payload means for the snapshot.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing::debug;

use super::health::{DiskHealth, SambaProcessStatus, SambaStatus, ServerStatus};
use super::share::ShareResource;
use super::{array_elements, object_entries};
use super::volume::Disk;

/// Event types the state coordinator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Volumes,
    Heartbeat,
    Shares,
}

/// Sections of a `heartbeat` object, each decoded independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Heartbeat {
    pub samba_status: Option<SambaStatus>,
    /// From the `samba_process_status` key.
    pub process_status: Option<SambaProcessStatus>,
    pub disk_health: Option<DiskHealth>,
    pub server: Option<ServerStatus>,
}

impl Heartbeat {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            samba_status: section(object, "samba_status"),
            process_status: process_section(object),
            disk_health: section(object, "disk_health"),
            server: server_section(object),
        }
    }
}

/// A decoded event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SratEvent {
    Volumes(Vec<Disk>),
    Heartbeat(Box<Heartbeat>),
    Shares(Vec<ShareResource>),
    /// Payload did not have the shape its event type requires.
    Malformed { kind: EventKind, reason: String },
}

impl SratEvent {
    /// Decode a payload. `None` for event types the coordinator ignores.
    pub fn decode(event_type: &str, payload: &Value) -> Option<Self> {
        let kind = event_type.parse::<EventKind>().ok()?;
        Some(Self::decode_kind(kind, payload))
    }

    pub fn decode_kind(kind: EventKind, payload: &Value) -> Self {
        let decoded = match kind {
            EventKind::Volumes => list(payload).map(Self::Volumes),
            EventKind::Shares => list(payload).map(Self::Shares),
            EventKind::Heartbeat => payload
                .as_object()
                .map(|object| Self::Heartbeat(Box::new(Heartbeat::from_object(object))))
                .ok_or_else(|| format!("expected object, got {}", json_type(payload))),
        };
        decoded.unwrap_or_else(|reason| Self::Malformed { kind, reason })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Volumes(_) => EventKind::Volumes,
            Self::Heartbeat(_) => EventKind::Heartbeat,
            Self::Shares(_) => EventKind::Shares,
            Self::Malformed { kind, .. } => *kind,
        }
    }
}

/// Array payloads always decode. An element that is not an object is
/// skipped.
fn list<T: DeserializeOwned>(payload: &Value) -> Result<Vec<T>, String> {
    payload
        .as_array()
        .map(|items| array_elements(items))
        .ok_or_else(|| format!("expected array, got {}", json_type(payload)))
}

/// Process entries that do not decode are skipped; the rest are kept.
fn process_section(object: &Map<String, Value>) -> Option<SambaProcessStatus> {
    let value = object.get("samba_process_status")?;
    let Some(entries) = value.as_object() else {
        if !value.is_null() {
            debug!(found = json_type(value), "samba_process_status is not an object");
        }
        return None;
    };
    Some(object_entries(entries))
}

fn section<T: DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Option<T> {
    let value = object.get(key)?;
    if !value.is_object() {
        if !value.is_null() {
            debug!(section = key, found = json_type(value), "heartbeat section is not an object");
        }
        return None;
    }
    T::deserialize(value)
        .inspect_err(|e| debug!(section = key, error = %e, "ill-shaped heartbeat section"))
        .ok()
}

fn server_section(object: &Map<String, Value>) -> Option<ServerStatus> {
    let fields: Map<String, Value> = ServerStatus::KEYS
        .iter()
        .filter_map(|&key| object.get(key).map(|v| (key.to_owned(), v.clone())))
        .collect();

    if fields.is_empty() {
        return None;
    }

    ServerStatus::deserialize(&Value::Object(fields))
        .inspect_err(|e| debug!(error = %e, "ill-shaped server liveness fields"))
        .ok()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
