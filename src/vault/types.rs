//! Payloads for Vault's `sys/mounts` endpoints.
//!
//! Field names follow the Vault HTTP API (snake case). Optional values are
//! omitted rather than sent empty so Vault keeps its own defaults for them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mount tunables, used both nested under `config` on create and as the tune body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfigInput {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_lease_ttl: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub max_lease_ttl: String,
    /// Only sent on tune; on create the description lives at the top level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub force_no_cache: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audit_non_hmac_request_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audit_non_hmac_response_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub listing_visibility: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passthrough_request_headers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_response_headers: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

/// Body of `PUT sys/mounts/<path>` (mount creation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountInput {
    #[serde(rename = "type")]
    pub mount_type: String,
    #[serde(default)]
    pub description: String,
    pub config: MountConfigInput,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub seal_wrap: bool,
    #[serde(default)]
    pub external_entropy_access: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

/// One entry of the `GET sys/mounts` listing
///
/// Only the fields the controller logs are decoded; everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOutput {
    #[serde(rename = "type", default)]
    pub mount_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub seal_wrap: bool,
    #[serde(default)]
    pub options: Option<BTreeMap<String, String>>,
}
