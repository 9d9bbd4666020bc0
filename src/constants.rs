//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group for all Vault custom resources
pub const API_GROUP: &str = "vault.octopilot.io";

/// Name reported as the event source and used as the field manager
pub const CONTROLLER_NAME: &str = "vault-config-controller";

/// Finalizer guarding remote deletion of `VaultMount` resources
pub const VAULT_MOUNT_FINALIZER: &str = "vaultmount.vault.octopilot.io/finalizer";

/// Finalizer guarding remote deletion of `VaultKVMount` resources
pub const VAULT_KV_MOUNT_FINALIZER: &str = "vaultkvmount.vault.octopilot.io/finalizer";

/// Finalizer guarding remote deletion of `VaultPolicy` resources
pub const VAULT_POLICY_FINALIZER: &str = "vaultpolicy.vault.octopilot.io/finalizer";

/// Auth reference used when a manifest does not declare `vaultAuthRef`
pub const DEFAULT_VAULT_AUTH_REF: &str = "default";

/// Default Vault server address
pub const DEFAULT_VAULT_ADDR: &str = "http://127.0.0.1:8200";

/// Default timeout for a single Vault HTTP request (seconds)
pub const DEFAULT_VAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default interval between successful reconciliations (seconds)
/// Re-applies the declared configuration to correct drift in Vault
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 600;

/// Default Fibonacci backoff starting value (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff maximum value (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default maximum number of reconciliations running at once per resource kind
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Event reason when an authenticated Vault client cannot be obtained
pub const REASON_VAULT_CLIENT_CONFIG_ERROR: &str = "VaultClientConfigError";

/// Event reason when the desired spec fails validation
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// Event reason when applying the desired state to Vault fails
pub const REASON_RECONCILE_FAILED: &str = "ReconcileFailed";
