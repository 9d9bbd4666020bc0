//! `VaultMount` and `VaultKVMount` resources.

use super::{auth_ref_for, validation, ManagedResource, ObservedStatus, ValidationError};
use crate::constants::{VAULT_KV_MOUNT_FINALIZER, VAULT_MOUNT_FINALIZER};
use crate::vault::{AuthRef, MountConfigInput, MountInput};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mount tunables
///
/// Overrides Vault's global defaults (system TTL, max TTL) for this mount only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MountConfig {
    /// Default lease duration, e.g. "5s" or "30m"
    #[serde(rename = "defaultLeaseTTL", default)]
    pub default_lease_ttl: String,
    /// Maximum lease duration, e.g. "5s" or "30m"
    #[serde(rename = "maxLeaseTTL", default)]
    pub max_lease_ttl: String,
    /// Disable caching
    #[serde(default)]
    pub force_no_cache: bool,
    /// Keys that will not be HMAC'd by audit devices in the request data object
    #[serde(rename = "auditNonHMACRequestKeys", default)]
    pub audit_non_hmac_request_keys: Vec<String>,
    /// Keys that will not be HMAC'd by audit devices in the response data object
    #[serde(rename = "auditNonHMACResponseKeys", default)]
    pub audit_non_hmac_response_keys: Vec<String>,
    /// Whether to show this mount in the UI-specific listing endpoint
    /// Valid values are "unauth" or "hidden"
    #[serde(default = "default_listing_visibility")]
    pub listing_visibility: String,
    /// Headers to whitelist and pass from the request to the plugin
    #[serde(default)]
    pub passthrough_request_headers: Vec<String>,
    /// Headers to whitelist, allowing a plugin to include them in the response
    #[serde(default)]
    pub allowed_response_headers: Vec<String>,
}

fn default_listing_visibility() -> String {
    "hidden".to_string()
}

// An omitted `config` block must tune the mount back to hidden, not skip the field
impl Default for MountConfig {
    fn default() -> Self {
        Self {
            default_lease_ttl: String::new(),
            max_lease_ttl: String::new(),
            force_no_cache: false,
            audit_non_hmac_request_keys: Vec::new(),
            audit_non_hmac_response_keys: Vec::new(),
            listing_visibility: default_listing_visibility(),
            passthrough_request_headers: Vec::new(),
            allowed_response_headers: Vec::new(),
        }
    }
}

/// Settings shared by every mount-like kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MountSettings {
    /// Path the secrets engine is mounted at
    pub path: String,
    /// Human-friendly description of the mount
    #[serde(default)]
    pub description: String,
    /// Tunables for this mount
    #[serde(default)]
    pub config: MountConfig,
    /// Local mount only: not replicated nor (if a secondary) removed by replication
    #[serde(default)]
    pub local: bool,
    /// Wrap stored values with the seal's encryption capability
    #[serde(default)]
    pub seal_wrap: bool,
    /// Allow the engine to access Vault's external entropy source
    #[serde(default)]
    pub external_entropy_access: bool,
    /// Mount type specific options passed to the backend
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl MountSettings {
    /// Mount path without leading or trailing slashes
    pub fn normalized_path(&self) -> String {
        self.path.trim_matches('/').to_string()
    }

    fn config_input(&self) -> MountConfigInput {
        MountConfigInput {
            default_lease_ttl: self.config.default_lease_ttl.clone(),
            max_lease_ttl: self.config.max_lease_ttl.clone(),
            description: None,
            force_no_cache: self.config.force_no_cache,
            audit_non_hmac_request_keys: self.config.audit_non_hmac_request_keys.clone(),
            audit_non_hmac_response_keys: self.config.audit_non_hmac_response_keys.clone(),
            listing_visibility: self.config.listing_visibility.clone(),
            passthrough_request_headers: self.config.passthrough_request_headers.clone(),
            allowed_response_headers: self.config.allowed_response_headers.clone(),
            options: BTreeMap::new(),
        }
    }

    /// Body for creating the mount
    ///
    /// `extra_options` are merged over the user supplied options.
    pub fn mount_input(
        &self,
        mount_type: &str,
        extra_options: &BTreeMap<String, String>,
    ) -> MountInput {
        let mut options = self.options.clone();
        options.extend(extra_options.clone());
        MountInput {
            mount_type: mount_type.to_string(),
            description: self.description.clone(),
            config: self.config_input(),
            local: self.local,
            seal_wrap: self.seal_wrap,
            external_entropy_access: self.external_entropy_access,
            options,
        }
    }

    /// Body for tuning an existing mount
    pub fn tune_input(&self, extra_options: &BTreeMap<String, String>) -> MountConfigInput {
        let mut options = self.options.clone();
        options.extend(extra_options.clone());
        MountConfigInput {
            description: Some(self.description.clone()),
            options,
            ..self.config_input()
        }
    }
}

/// VaultMount Custom Resource Definition
///
/// Declares a secrets engine mount of any type.
///
/// # Example
///
/// ```yaml
/// apiVersion: vault.octopilot.io/v1alpha1
/// kind: VaultMount
/// metadata:
///   name: team-pki
///   namespace: team-a
/// spec:
///   type: pki
///   path: team-a/pki
///   description: Team A issuing CA
///   config:
///     maxLeaseTTL: 8760h
/// ```
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "VaultMount",
    group = "vault.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "VaultMountStatus",
    shortname = "vm",
    printcolumn = r#"{"name":"Path", "type":"string", "jsonPath":".spec.path"}"#,
    printcolumn = r#"{"name":"Valid", "type":"boolean", "jsonPath":".status.valid"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VaultMountSpec {
    /// Name of the Vault auth configuration to use
    /// Defaults to `default` in the resource's namespace
    #[serde(default)]
    pub vault_auth_ref: Option<String>,
    /// Vault namespace requests are sent to
    #[serde(default)]
    pub namespace: Option<String>,
    /// Backend type, such as "pki", "transit" or "aws"
    #[serde(rename = "type")]
    pub mount_type: String,
    #[serde(flatten)]
    pub settings: MountSettings,
}

/// KV secrets engine version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum KvVersion {
    #[serde(rename = "1")]
    V1,
    #[default]
    #[serde(rename = "2")]
    V2,
}

impl KvVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            KvVersion::V1 => "1",
            KvVersion::V2 => "2",
        }
    }
}

/// VaultKVMount Custom Resource Definition
///
/// Declares a key/value secrets engine. The mount type is always `kv`; the
/// version is passed to Vault as the `version` mount option.
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "VaultKVMount",
    group = "vault.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "VaultMountStatus",
    shortname = "vkvm",
    printcolumn = r#"{"name":"Path", "type":"string", "jsonPath":".spec.path"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Valid", "type":"boolean", "jsonPath":".status.valid"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VaultKVMountSpec {
    /// Name of the Vault auth configuration to use
    #[serde(default)]
    pub vault_auth_ref: Option<String>,
    /// Vault namespace requests are sent to
    #[serde(default)]
    pub namespace: Option<String>,
    /// KV engine version, "1" or "2"
    #[serde(default)]
    pub version: KvVersion,
    #[serde(flatten)]
    pub settings: MountSettings,
}

impl VaultKVMountSpec {
    /// Mount type sent to Vault
    pub const MOUNT_TYPE: &'static str = "kv";

    /// Options forced on top of the user supplied ones
    pub fn version_options(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("version".to_string(), self.version.as_str().to_string())])
    }
}

/// Status of a mount-like resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultMountStatus {
    /// True once the mount matches the spec in Vault
    #[serde(default)]
    pub valid: bool,
    /// Last reconciliation error, empty on success
    #[serde(default)]
    pub error: String,
    /// Path the mount was last applied at
    #[serde(default)]
    pub path: String,
}

impl From<&VaultMountStatus> for ObservedStatus {
    fn from(status: &VaultMountStatus) -> Self {
        Self {
            valid: status.valid,
            error: status.error.clone(),
            identity: status.path.clone(),
        }
    }
}

impl From<ObservedStatus> for VaultMountStatus {
    fn from(status: ObservedStatus) -> Self {
        Self {
            valid: status.valid,
            error: status.error,
            path: status.identity,
        }
    }
}

impl ManagedResource for VaultMount {
    const FINALIZER: &'static str = VAULT_MOUNT_FINALIZER;

    fn auth_ref(&self) -> AuthRef {
        auth_ref_for(
            self,
            self.spec.vault_auth_ref.as_ref(),
            self.spec.namespace.as_ref(),
        )
    }

    fn desired_identity(&self) -> String {
        self.spec.settings.normalized_path()
    }

    fn observed(&self) -> ObservedStatus {
        self.status.as_ref().map(ObservedStatus::from).unwrap_or_default()
    }

    fn set_observed(&mut self, status: ObservedStatus) {
        self.status = Some(status.into());
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.spec.mount_type.trim().is_empty() {
            return Err(ValidationError::MissingField("type"));
        }
        validation::validate_mount_settings(&self.spec.settings)
    }
}

impl ManagedResource for VaultKVMount {
    const FINALIZER: &'static str = VAULT_KV_MOUNT_FINALIZER;

    fn auth_ref(&self) -> AuthRef {
        auth_ref_for(
            self,
            self.spec.vault_auth_ref.as_ref(),
            self.spec.namespace.as_ref(),
        )
    }

    fn desired_identity(&self) -> String {
        self.spec.settings.normalized_path()
    }

    fn observed(&self) -> ObservedStatus {
        self.status.as_ref().map(ObservedStatus::from).unwrap_or_default()
    }

    fn set_observed(&mut self, status: ObservedStatus) {
        self.status = Some(status.into());
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_mount_settings(&self.spec.settings)
    }
}
