// ── Share domain types ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient, lenient_list};

use super::volume::MountPoint;

/// A Samba share as published by the `shares` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareResource {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub disabled: Option<bool>,
    /// `none`, `backup`, `media`, `share`, `internal`, ...
    #[serde(default, deserialize_with = "lenient")]
    pub usage: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub timemachine: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub recycle_bin_enabled: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub invalid: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_ha_mounted: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub ha_status: Option<String>,

    #[serde(default, deserialize_with = "lenient_list")]
    pub users: Option<Vec<ShareUser>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub ro_users: Option<Vec<ShareUser>>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub veto_files: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient")]
    pub mount_point_data: Option<MountPoint>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A Samba user with access to a share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareUser {
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_admin: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ShareResource {
    pub fn is_enabled(&self) -> bool {
        !self.disabled.unwrap_or(false)
    }
}
