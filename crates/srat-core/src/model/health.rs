// ── Heartbeat domain types ──
//
// The `heartbeat` event carries one object with several independent
// sections. Each section is decoded on its own, so one malformed section
// does not invalidate the others.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient, lenient_list, lenient_map};

/// Output of `smbstatus`: open sessions and tree connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SambaStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub smb_conf: Option<String>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub sessions: Option<BTreeMap<String, SambaSession>>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub tcons: Option<BTreeMap<String, SambaTcon>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SambaSession {
    #[serde(default, deserialize_with = "lenient")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub groupname: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub uid: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub gid: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub remote_machine: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub hostname: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub session_dialect: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub creation_time: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SambaTcon {
    #[serde(default, deserialize_with = "lenient")]
    pub tcon_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub share: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub device: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub service: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub machine: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub connected_at: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-process status of the Samba daemons, keyed by process name
/// (`smbd`, `nmbd`, `wsdd2`, ...).
pub type SambaProcessStatus = BTreeMap<String, ProcessStatus>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub pid: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub create_time: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cpu_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub memory_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub open_files: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub connections: Option<i64>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub status: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_running: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Disk I/O and per-partition health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskHealth {
    #[serde(default, deserialize_with = "lenient")]
    pub global: Option<GlobalDiskStats>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub per_disk_io: Option<Vec<DiskIoStats>>,
    /// Keyed by disk id; values are backend-defined partition reports.
    #[serde(default, deserialize_with = "lenient_map")]
    pub per_partition_info: Option<BTreeMap<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalDiskStats {
    #[serde(default, deserialize_with = "lenient")]
    pub total_iops: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_read_latency_ms: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_write_latency_ms: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskIoStats {
    #[serde(default, deserialize_with = "lenient")]
    pub device_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub device_description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub read_iops: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub write_iops: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub read_latency_ms: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub write_latency_ms: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub smart_data: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Liveness and mode flags of the SRAT server itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub alive: Option<bool>,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "aliveTime")]
    #[serde(default, deserialize_with = "lenient")]
    pub alive_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub start_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub build_version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub read_only: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub protected_mode: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub secure_mode: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub last_error: Option<String>,
}

impl ServerStatus {
    /// Keys of the heartbeat object this type is built from.
    pub(crate) const KEYS: [&'static str; 8] = [
        "alive",
        "aliveTime",
        "start_time",
        "build_version",
        "read_only",
        "protected_mode",
        "secure_mode",
        "last_error",
    ];

    pub fn is_alive(&self) -> bool {
        self.alive.unwrap_or(false)
    }
}
