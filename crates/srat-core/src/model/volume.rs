// ── Volume domain types ──
//
// Payload of the `volumes` event: every block device the backend knows about,
// each with its partitions and their mount points. Fields the backend may
// omit are optional; unknown fields are kept in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient, lenient_list};

/// A physical or virtual disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub device: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub vendor: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub serial: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub revision: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub connection_bus: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub seat: Option<String>,

    /// Size in bytes.
    #[serde(default, deserialize_with = "lenient")]
    pub size: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub removable: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub ejectable: Option<bool>,

    #[serde(default, deserialize_with = "lenient_list")]
    pub partitions: Option<Vec<Partition>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One partition of a [`Disk`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub device: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub size: Option<u64>,
    /// System partitions are never offered for sharing.
    #[serde(default, deserialize_with = "lenient")]
    pub system: Option<bool>,

    #[serde(default, deserialize_with = "lenient_list")]
    pub mount_point_data: Option<Vec<MountPoint>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub host_mount_point_data: Option<Vec<MountPoint>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where (and whether) a partition is mounted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountPoint {
    #[serde(default, deserialize_with = "lenient")]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub fstype: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_mounted: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub invalid: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub invalid_error: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Disk {
    /// Partitions, or an empty slice when the backend sent none.
    pub fn partitions(&self) -> &[Partition] {
        self.partitions.as_deref().unwrap_or_default()
    }

    /// Display label: model, then device, then id.
    pub fn label(&self) -> &str {
        self.model
            .as_deref()
            .or(self.device.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("<unknown disk>")
    }
}

impl Partition {
    /// `true` if any mount point reports the partition as mounted.
    pub fn is_mounted(&self) -> bool {
        self.mount_point_data
            .iter()
            .flatten()
            .any(|mp| mp.is_mounted == Some(true))
    }
}
