//! # Reconciler
//!
//! Keeps Vault in line with `VaultMount`, `VaultKVMount` and `VaultPolicy`
//! manifests.
//!
//! - `driver`: per-event entry point and status handling
//! - `lifecycle`: finalizer-gated create/delete orchestration
//! - `convergence`: per-kind Vault operations
//! - `store`: Kubernetes access (manifests, finalizers, status, events)
//! - `types`: errors and shared context

pub mod convergence;
pub mod driver;
pub mod lifecycle;
pub mod store;
pub mod types;

pub use convergence::{
    converge, ConvergenceOutcome, ConvergenceStrategy, Existence, MountStrategy, PolicyStrategy,
};
pub use driver::{reconcile, reconcile_resource, ReconcileOutcome};
pub use lifecycle::{lifecycle_state, LifecycleState};
pub use store::{KubeStore, ResourceStore};
pub use types::{resource_key, BackoffState, Reconciler, ReconcilerError};
