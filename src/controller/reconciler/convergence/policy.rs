//! Policy convergence: writing an ACL policy replaces it, so every pass is an
//! unconditional upsert.

use super::{ConvergenceStrategy, Existence};
use crate::controller::reconciler::ReconcilerError;
use crate::crd::{ManagedResource, VaultPolicy};
use crate::vault::{VaultClient, VaultError};
use async_trait::async_trait;
use tracing::info;

fn policy_path(name: &str) -> String {
    format!("/sys/policies/acl/{name}")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyStrategy;

#[async_trait]
impl ConvergenceStrategy for PolicyStrategy {
    type Resource = VaultPolicy;

    async fn exists(
        &self,
        _client: &dyn VaultClient,
        _resource: &VaultPolicy,
    ) -> Result<Existence, ReconcilerError> {
        Ok(Existence::Unchecked)
    }

    async fn apply(
        &self,
        client: &dyn VaultClient,
        resource: &VaultPolicy,
        _existence: Existence,
    ) -> Result<(), ReconcilerError> {
        let name = resource.desired_identity();
        let target = policy_path(&name);
        let payload = resource.spec.document().to_payload()?;

        info!("Writing policy '{}'", name);
        client
            .write(&target, &payload)
            .await
            .map(|_| ())
            .map_err(ReconcilerError::vault("write", target))
    }

    async fn cleanup_old_identity(
        &self,
        client: &dyn VaultClient,
        identity: &str,
    ) -> Result<(), VaultError> {
        client.delete(&policy_path(identity)).await
    }

    async fn remove(
        &self,
        client: &dyn VaultClient,
        resource: &VaultPolicy,
    ) -> Result<(), ReconcilerError> {
        let name = resource.desired_identity();
        let target = policy_path(&name);
        info!("Deleting policy '{}'", name);
        client
            .delete(&target)
            .await
            .map_err(ReconcilerError::vault("delete", target))?;

        let previous = resource.observed().identity;
        if !previous.is_empty() && previous != name {
            let target = policy_path(&previous);
            info!("Deleting previous policy '{}'", previous);
            client
                .delete(&target)
                .await
                .map_err(ReconcilerError::vault("delete", target))?;
        }
        Ok(())
    }
}
