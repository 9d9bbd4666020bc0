//! # Lifecycle
//!
//! Finalizer-gated lifecycle shared by every resource kind.
//!
//! ```text
//! Pending --(finalizer added)--> Active --(deletion requested)--> Deleting --(remote delete ok,
//!                                                                            finalizer removed)--> Gone
//! ```
//!
//! A failed remote delete leaves the resource in `Deleting` with its finalizer
//! in place, so deletion is retried until it succeeds, across restarts.

use super::convergence::ConvergenceStrategy;
use super::store::ResourceStore;
use super::ReconcilerError;
use crate::crd::ManagedResource;
use crate::observability::metrics;
use crate::vault::VaultClient;
use kube::{Resource, ResourceExt};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not being deleted, finalizer not attached yet
    Pending,
    /// Not being deleted, finalizer attached
    Active,
    /// Deletion requested, finalizer still blocking removal
    Deleting,
    /// Deletion requested and nothing left for this controller to do
    Gone,
}

pub fn lifecycle_state<K: ManagedResource>(resource: &K) -> LifecycleState {
    let has_finalizer = resource.finalizers().iter().any(|f| f == K::FINALIZER);
    let deleting = resource.meta().deletion_timestamp.is_some();

    match (deleting, has_finalizer) {
        (false, false) => LifecycleState::Pending,
        (false, true) => LifecycleState::Active,
        (true, true) => LifecycleState::Deleting,
        (true, false) => LifecycleState::Gone,
    }
}

/// Attach the finalizer unless already present
///
/// Returns the manifest as the control plane now has it.
pub async fn ensure_finalizer<K: ManagedResource>(
    store: &dyn ResourceStore<K>,
    resource: K,
) -> Result<K, ReconcilerError> {
    if lifecycle_state(&resource) != LifecycleState::Pending {
        return Ok(resource);
    }
    info!(
        "Adding finalizer {} to {}/{}",
        K::FINALIZER,
        resource.namespace().unwrap_or_default(),
        resource.name_any()
    );
    store.add_finalizer(&resource).await
}

/// Delete the Vault object, then release the manifest
///
/// The finalizer is only removed once the remote delete succeeded.
pub async fn finalize<S: ConvergenceStrategy>(
    strategy: &S,
    store: &dyn ResourceStore<S::Resource>,
    client: &dyn VaultClient,
    resource: &S::Resource,
) -> Result<(), ReconcilerError> {
    strategy.remove(client, resource).await?;
    store.remove_finalizer(resource).await?;

    let kind = <S::Resource as Resource>::kind(&());
    metrics::increment_finalizers_removed(&kind);
    info!(
        "Removed finalizer from {} {}/{}",
        kind,
        resource.namespace().unwrap_or_default(),
        resource.name_any()
    );
    Ok(())
}
