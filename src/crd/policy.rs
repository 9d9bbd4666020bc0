//! `VaultPolicy` resource and its ACL document encoding.

use super::{auth_ref_for, validation, ManagedResource, ObservedStatus, ValidationError};
use crate::constants::VAULT_POLICY_FINALIZER;
use crate::vault::AuthRef;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rules for one path pattern
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultPolicyPath {
    /// Capabilities granted on the path, e.g. ["read", "list"]
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Parameters (and allowed values) that may be supplied
    #[serde(default)]
    pub allowed_parameters: BTreeMap<String, Vec<String>>,
    /// Parameters (and values) that are rejected
    #[serde(default)]
    pub denied_parameters: BTreeMap<String, Vec<String>>,
    /// Parameters that must be supplied
    #[serde(default)]
    pub required_parameters: Vec<String>,
    /// Minimum response-wrapping TTL
    #[serde(rename = "minWrappingTTL", default, skip_serializing_if = "Option::is_none")]
    pub min_wrapping_ttl: Option<String>,
    /// Maximum response-wrapping TTL
    #[serde(rename = "maxWrappingTTL", default, skip_serializing_if = "Option::is_none")]
    pub max_wrapping_ttl: Option<String>,
}

/// VaultPolicy Custom Resource Definition
///
/// Declares an ACL policy named after the resource itself.
///
/// # Example
///
/// ```yaml
/// apiVersion: vault.octopilot.io/v1alpha1
/// kind: VaultPolicy
/// metadata:
///   name: app-reader
///   namespace: team-a
/// spec:
///   path:
///     "secret/*":
///       capabilities: ["read", "list"]
/// ```
#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "VaultPolicy",
    group = "vault.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "VaultPolicyStatus",
    shortname = "vp",
    printcolumn = r#"{"name":"Valid", "type":"boolean", "jsonPath":".status.valid"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VaultPolicySpec {
    /// Name of the Vault auth configuration to use
    #[serde(default)]
    pub vault_auth_ref: Option<String>,
    /// Vault namespace requests are sent to
    #[serde(default)]
    pub namespace: Option<String>,
    /// Path pattern to rules
    pub path: BTreeMap<String, VaultPolicyPath>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultPolicyStatus {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub error: String,
    /// Policy name last written to Vault
    #[serde(default)]
    pub name: String,
}

/// One path block of the ACL document, in Vault's field naming
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicyRule {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub allowed_parameters: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub denied_parameters: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_parameters: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub min_wrapping_ttl: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub max_wrapping_ttl: String,
}

impl From<&VaultPolicyPath> for PolicyRule {
    fn from(path: &VaultPolicyPath) -> Self {
        Self {
            capabilities: path.capabilities.clone(),
            allowed_parameters: path.allowed_parameters.clone(),
            denied_parameters: path.denied_parameters.clone(),
            required_parameters: path.required_parameters.clone(),
            min_wrapping_ttl: path.min_wrapping_ttl.clone().unwrap_or_default(),
            max_wrapping_ttl: path.max_wrapping_ttl.clone().unwrap_or_default(),
        }
    }
}

/// ACL policy document (`{"path": {...}}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    pub path: BTreeMap<String, PolicyRule>,
}

impl PolicyDocument {
    /// Body of `PUT sys/policies/acl/<name>`
    ///
    /// Vault accepts JSON as well as HCL in the `policy` field; the document is
    /// embedded as a JSON string.
    ///
    /// # Errors
    /// Returns an error if the document cannot be serialized
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        let policy = serde_json::to_string(self)?;
        Ok(serde_json::json!({ "policy": policy }))
    }
}

impl VaultPolicySpec {
    pub fn document(&self) -> PolicyDocument {
        PolicyDocument {
            path: self
                .path
                .iter()
                .map(|(pattern, rule)| (pattern.clone(), PolicyRule::from(rule)))
                .collect(),
        }
    }
}

impl ManagedResource for VaultPolicy {
    const FINALIZER: &'static str = VAULT_POLICY_FINALIZER;

    fn auth_ref(&self) -> AuthRef {
        auth_ref_for(
            self,
            self.spec.vault_auth_ref.as_ref(),
            self.spec.namespace.as_ref(),
        )
    }

    fn desired_identity(&self) -> String {
        self.name_any()
    }

    fn observed(&self) -> ObservedStatus {
        self.status
            .as_ref()
            .map(|status| ObservedStatus {
                valid: status.valid,
                error: status.error.clone(),
                identity: status.name.clone(),
            })
            .unwrap_or_default()
    }

    fn set_observed(&mut self, status: ObservedStatus) {
        self.status = Some(VaultPolicyStatus {
            valid: status.valid,
            error: status.error,
            name: status.identity,
        });
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_policy_spec(&self.spec)
    }
}
