//! # Convergence
//!
//! Decides and applies the Vault operations that bring one resource in line
//! with its desired spec.
//!
//! Every kind follows the same sequence:
//!
//! 1. check whether the object already exists at the desired identity
//! 2. create or update it there
//! 3. if the last applied identity differs, delete the object left behind
//!
//! Step 3 only runs after step 2 succeeded. A crash in between leaves a
//! duplicate in Vault, never a gap, and the next pass finishes the cleanup.
//!
//! Kinds plug in through [`ConvergenceStrategy`].

mod mount;
mod policy;

pub use mount::{MountLike, MountStrategy};
pub use policy::PolicyStrategy;

use super::ReconcilerError;
use crate::crd::ManagedResource;
use crate::vault::{VaultClient, VaultError};
use async_trait::async_trait;
use kube::Resource;
use tracing::{debug, info};

/// What the existence check found at the desired identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Present,
    Absent,
    /// The kind does not distinguish create from update
    Unchecked,
}

/// Per-kind remote operations
#[async_trait]
pub trait ConvergenceStrategy: Send + Sync {
    type Resource: ManagedResource;

    /// Look for the object at the desired identity
    async fn exists(
        &self,
        client: &dyn VaultClient,
        resource: &Self::Resource,
    ) -> Result<Existence, ReconcilerError>;

    /// Create or update the object at the desired identity
    async fn apply(
        &self,
        client: &dyn VaultClient,
        resource: &Self::Resource,
        existence: Existence,
    ) -> Result<(), ReconcilerError>;

    /// Delete the object at a previously applied identity
    async fn cleanup_old_identity(
        &self,
        client: &dyn VaultClient,
        identity: &str,
    ) -> Result<(), VaultError>;

    /// Delete everything this resource owns in Vault
    async fn remove(
        &self,
        client: &dyn VaultClient,
        resource: &Self::Resource,
    ) -> Result<(), ReconcilerError>;
}

/// Result of one successful convergence pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceOutcome {
    /// Identity the object now lives at
    pub identity: String,
    pub existence: Existence,
    /// Identity that was cleaned up after a rename
    pub renamed_from: Option<String>,
}

/// Identities are compared without surrounding slashes
fn normalize_identity(identity: &str) -> &str {
    identity.trim_matches('/')
}

/// Bring the Vault object for `resource` to its desired state
///
/// # Errors
/// Any failed Vault call aborts the pass. A failed rename cleanup is reported
/// as [`ReconcilerError::StaleCleanup`] even though the new object exists.
///
/// Only the last successfully applied identity is recorded. If a move from A
/// to B fails its cleanup and the spec is then reverted to A, nothing points
/// at B any more and it stays behind in Vault.
pub async fn converge<S: ConvergenceStrategy>(
    strategy: &S,
    client: &dyn VaultClient,
    resource: &S::Resource,
) -> Result<ConvergenceOutcome, ReconcilerError> {
    let kind = <S::Resource as Resource>::kind(&());
    let desired = resource.desired_identity();
    let previous = resource.observed().identity;

    let existence = strategy.exists(client, resource).await?;
    debug!("{} '{}' existence: {:?}", kind, desired, existence);

    strategy.apply(client, resource, existence).await?;

    let previous = normalize_identity(&previous);
    let renamed_from = if !previous.is_empty() && previous != normalize_identity(&desired) {
        info!(
            "{} moved from '{}' to '{}', removing the old one",
            kind, previous, desired
        );
        strategy
            .cleanup_old_identity(client, previous)
            .await
            .map_err(|source| ReconcilerError::StaleCleanup {
                kind: kind.to_string(),
                identity: previous.to_string(),
                source,
            })?;
        Some(previous.to_string())
    } else {
        None
    };

    Ok(ConvergenceOutcome {
        identity: desired,
        existence,
        renamed_from,
    })
}
