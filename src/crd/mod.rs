//! # Custom Resource Definitions
//!
//! Desired-state specifications and observed status for every resource kind
//! the controller manages:
//!
//! - [`VaultMount`]: a secret-engine mount of any type
//! - [`VaultKVMount`]: a versioned key/value mount
//! - [`VaultPolicy`]: an ACL policy
//!
//! Each kind implements [`ManagedResource`], the small surface the generic
//! lifecycle and reconcile driver need.

mod mount;
mod policy;
pub mod validation;

pub use mount::{
    KvVersion, MountConfig, MountSettings, VaultKVMount, VaultKVMountSpec, VaultMount,
    VaultMountSpec, VaultMountStatus,
};
pub use policy::{PolicyDocument, PolicyRule, VaultPolicy, VaultPolicyPath, VaultPolicySpec, VaultPolicyStatus};
pub use validation::ValidationError;

use crate::vault::AuthRef;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Status fields shared by every kind
///
/// `identity` is the path (mounts) or name (policies) that was last applied
/// successfully. It is how a rename is detected on the next reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedStatus {
    pub valid: bool,
    pub error: String,
    pub identity: String,
}

/// A namespaced custom resource whose remote counterpart lives in Vault
pub trait ManagedResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + std::fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Finalizer blocking deletion until the Vault object is removed
    const FINALIZER: &'static str;

    /// Vault credentials this manifest asks for
    fn auth_ref(&self) -> AuthRef;

    /// Path or name the Vault object should have
    fn desired_identity(&self) -> String;

    /// Status as last persisted
    fn observed(&self) -> ObservedStatus;

    /// Replace the in-memory status
    fn set_observed(&mut self, status: ObservedStatus);

    /// Check the desired spec for values Vault would reject
    ///
    /// # Errors
    /// Returns the first problem found
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Build an [`AuthRef`] from the common spec fields
fn auth_ref_for<K: Resource>(
    resource: &K,
    vault_auth_ref: Option<&String>,
    vault_namespace: Option<&String>,
) -> AuthRef {
    AuthRef {
        namespace: resource.meta().namespace.clone().unwrap_or_default(),
        name: vault_auth_ref
            .filter(|name| !name.is_empty())
            .cloned()
            .unwrap_or_else(|| crate::constants::DEFAULT_VAULT_AUTH_REF.to_string()),
        vault_namespace: vault_namespace.filter(|ns| !ns.is_empty()).cloned(),
    }
}
