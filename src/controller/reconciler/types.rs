//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::constants::{
    REASON_INVALID_SPEC, REASON_RECONCILE_FAILED, REASON_VAULT_CLIENT_CONFIG_ERROR,
};
use crate::controller::backoff::FibonacciBackoff;
use crate::crd::ValidationError;
use crate::vault::{ClientFactory, VaultError};
use kube::Client;
use kube_runtime::events::Reporter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Failed to get Vault auth login for {auth_ref}: {source}")]
    ClientConfig {
        auth_ref: String,
        #[source]
        source: VaultError,
    },

    #[error("Invalid spec: {0}")]
    InvalidSpec(#[from] ValidationError),

    #[error("Vault {operation} on {path} failed: {source}")]
    Vault {
        operation: &'static str,
        path: String,
        #[source]
        source: VaultError,
    },

    #[error("Failed to remove stale {kind} at '{identity}': {source}")]
    StaleCleanup {
        kind: String,
        identity: String,
        #[source]
        source: VaultError,
    },

    #[error("{0} was modified concurrently, retrying from a fresh read")]
    Conflict(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReconcilerError {
    pub(crate) fn vault(operation: &'static str, path: impl Into<String>) -> impl FnOnce(VaultError) -> Self {
        let path = path.into();
        move |source| Self::Vault {
            operation,
            path,
            source,
        }
    }

    /// Map a write error, singling out optimistic-concurrency conflicts
    pub(crate) fn from_write(name: &str) -> impl FnOnce(kube::Error) -> Self + '_ {
        move |error| match error {
            kube::Error::Api(ref response) if response.code == 409 => {
                Self::Conflict(name.to_string())
            }
            other => Self::Kube(other),
        }
    }

    /// Event reason and metric label for this error
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ClientConfig { .. } => REASON_VAULT_CLIENT_CONFIG_ERROR,
            Self::InvalidSpec(_) => REASON_INVALID_SPEC,
            _ => REASON_RECONCILE_FAILED,
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_seconds, max_seconds),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Shared context handed to every reconciliation
#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    // Vault clients are created per reconciliation from the resource's auth ref
    pub vault_factory: Arc<dyn ClientFactory>,
    pub config: Arc<ControllerConfig>,
    pub reporter: Reporter,
    // Backoff state per resource (identified by kind/namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("reporter", &self.reporter)
            .field("vault_address", &self.config.vault_address)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        client: Client,
        vault_factory: Arc<dyn ClientFactory>,
        config: Arc<ControllerConfig>,
    ) -> Self {
        let reporter = Reporter {
            controller: crate::constants::CONTROLLER_NAME.to_string(),
            instance: config.pod_name.clone(),
        };
        Self {
            client,
            vault_factory,
            config,
            reporter,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the error history of a resource after it reconciled cleanly
    pub fn reset_backoff(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(key);
        }
    }
}

/// Key identifying a resource in per-resource state maps
pub fn resource_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind}/{namespace}/{name}")
}
