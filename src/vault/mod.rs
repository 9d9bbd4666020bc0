//! # Vault
//!
//! Remote configuration client for the Vault administrative API.
//!
//! The reconciler only ever talks to Vault through the [`VaultClient`] trait,
//! and obtains a client per reconciliation from a [`ClientFactory`]. This keeps
//! credentials out of process-wide state and lets tests substitute an
//! in-memory Vault per scenario.
//!
//! - `rest`: HTTP implementation of [`VaultClient`]
//! - `factory`: token-based [`ClientFactory`]
//! - `types`: request/response payloads for mount operations

mod factory;
mod rest;
mod types;

pub use factory::{TokenClientFactory, TokenSource};
pub use rest::VaultRestClient;
pub use types::{MountConfigInput, MountInput, MountOutput};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by Vault operations
#[derive(Debug, Error)]
pub enum VaultError {
    /// Transport-level failure (connection refused, timeout, TLS)
    #[error("Vault request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Vault answered with a non-success status
    #[error("Vault returned HTTP {status} for {path}: {}", .errors.join("; "))]
    Api {
        status: u16,
        path: String,
        errors: Vec<String>,
    },
    /// Response body could not be decoded
    #[error("failed to decode Vault response for {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// No token available to authenticate with
    #[error("no Vault token configured: {0}")]
    MissingToken(String),
    /// HTTP client could not be constructed
    #[error("failed to build Vault HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl VaultError {
    /// HTTP status returned by Vault, if the error came from an API response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Authenticated access to Vault's administrative API
///
/// Paths are relative to `/v1/` and may be given with or without a leading slash.
#[async_trait]
pub trait VaultClient: Send + Sync {
    /// Read the document at `path`, `None` when nothing exists there
    async fn read(&self, path: &str) -> Result<Option<serde_json::Value>, VaultError>;

    /// Upsert a document at `path`
    async fn write(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>, VaultError>;

    /// Remove whatever exists at `path`; deleting an absent path succeeds
    async fn delete(&self, path: &str) -> Result<(), VaultError>;

    /// List all secret-engine mounts keyed by their path with a trailing slash
    async fn list_mounts(&self) -> Result<BTreeMap<String, MountOutput>, VaultError>;

    /// Partially update the tunables of an existing mount
    async fn tune_mount(&self, path: &str, config: &MountConfigInput) -> Result<(), VaultError>;
}

/// Identifies which Vault credentials a manifest asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRef {
    /// Kubernetes namespace of the manifest
    pub namespace: String,
    /// Declared `vaultAuthRef`, defaulted when absent
    pub name: String,
    /// Vault enterprise namespace requests are routed to
    pub vault_namespace: Option<String>,
}

/// Produces an authenticated [`VaultClient`] for a manifest
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Get a client scoped to the given auth reference
    async fn client_for(&self, auth_ref: &AuthRef) -> Result<Arc<dyn VaultClient>, VaultError>;
}

/// Normalize a mount path to the key form used by `sys/mounts` listings
///
/// ```
/// use vault_config_controller::vault::mount_key;
///
/// assert_eq!(mount_key("secret"), "secret/");
/// assert_eq!(mount_key("/team/kv/"), "team/kv/");
/// ```
pub fn mount_key(path: &str) -> String {
    format!("{}/", path.trim_matches('/'))
}
