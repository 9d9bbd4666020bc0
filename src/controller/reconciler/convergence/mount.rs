//! Mount convergence: create when absent, tune when present.
//!
//! Vault refuses to mount twice at the same path, so an existing mount is
//! only ever tuned.

use super::{ConvergenceStrategy, Existence};
use crate::controller::reconciler::ReconcilerError;
use crate::crd::validation::validate_mount_path;
use crate::crd::{ManagedResource, MountSettings, VaultKVMount, VaultKVMountSpec, VaultMount};
use crate::vault::{mount_key, VaultClient, VaultError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::{info, warn};

const MOUNTS_PATH: &str = "/sys/mounts";

/// A resource that declares a secrets engine mount
pub trait MountLike: ManagedResource {
    /// Backend type sent on creation
    fn mount_type(&self) -> &str;

    fn settings(&self) -> &MountSettings;

    /// Options that override the user supplied ones
    fn forced_options(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

impl MountLike for VaultMount {
    fn mount_type(&self) -> &str {
        &self.spec.mount_type
    }

    fn settings(&self) -> &MountSettings {
        &self.spec.settings
    }
}

impl MountLike for VaultKVMount {
    fn mount_type(&self) -> &str {
        VaultKVMountSpec::MOUNT_TYPE
    }

    fn settings(&self) -> &MountSettings {
        &self.spec.settings
    }

    fn forced_options(&self) -> BTreeMap<String, String> {
        self.spec.version_options()
    }
}

fn mount_path(path: &str) -> String {
    format!("{MOUNTS_PATH}/{}", path.trim_matches('/'))
}

/// [`ConvergenceStrategy`] for every [`MountLike`] kind
pub struct MountStrategy<K>(PhantomData<fn() -> K>);

impl<K> Default for MountStrategy<K> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

#[async_trait]
impl<K: MountLike> ConvergenceStrategy for MountStrategy<K> {
    type Resource = K;

    async fn exists(
        &self,
        client: &dyn VaultClient,
        resource: &K,
    ) -> Result<Existence, ReconcilerError> {
        let mounts = client
            .list_mounts()
            .await
            .map_err(ReconcilerError::vault("list_mounts", MOUNTS_PATH))?;

        let key = mount_key(&resource.desired_identity());
        Ok(if mounts.contains_key(&key) {
            Existence::Present
        } else {
            Existence::Absent
        })
    }

    async fn apply(
        &self,
        client: &dyn VaultClient,
        resource: &K,
        existence: Existence,
    ) -> Result<(), ReconcilerError> {
        let path = resource.desired_identity();
        let settings = resource.settings();
        let forced = resource.forced_options();

        match existence {
            Existence::Present => {
                info!("Tuning {} mount at '{}'", resource.mount_type(), path);
                client
                    .tune_mount(&path, &settings.tune_input(&forced))
                    .await
                    .map_err(ReconcilerError::vault("tune_mount", mount_path(&path)))
            }
            Existence::Absent | Existence::Unchecked => {
                info!("Mounting {} at '{}'", resource.mount_type(), path);
                let payload =
                    serde_json::to_value(settings.mount_input(resource.mount_type(), &forced))?;
                let target = mount_path(&path);
                client
                    .write(&target, &payload)
                    .await
                    .map(|_| ())
                    .map_err(ReconcilerError::vault("write", target))
            }
        }
    }

    async fn cleanup_old_identity(
        &self,
        client: &dyn VaultClient,
        identity: &str,
    ) -> Result<(), VaultError> {
        client.delete(&mount_path(identity)).await
    }

    async fn remove(&self, client: &dyn VaultClient, resource: &K) -> Result<(), ReconcilerError> {
        for path in removal_targets(resource) {
            let target = mount_path(&path);
            info!("Unmounting '{}'", path);
            client
                .delete(&target)
                .await
                .map_err(ReconcilerError::vault("delete", target))?;
        }
        Ok(())
    }
}

/// Paths this resource may own in Vault, desired first
///
/// The desired path is only ever mounted once the whole spec validated, so an
/// invalid spec contributes nothing. The recorded path covers a rename still
/// in flight. Anything that is not a plain mount path is skipped: Vault would
/// resolve `a/../b` to a mount this resource never created.
fn removal_targets<K: MountLike>(resource: &K) -> Vec<String> {
    let mut targets = Vec::new();

    let desired = resource.desired_identity();
    match resource.validate() {
        Ok(()) => targets.push(desired),
        Err(e) => warn!("Not unmounting '{}', it was never applied: {}", desired, e),
    }

    let previous = resource.observed().identity;
    let previous = previous.trim_matches('/');
    if !previous.is_empty() && !targets.iter().any(|t| t == previous) {
        match validate_mount_path(previous) {
            Ok(()) => targets.push(previous.to_string()),
            Err(e) => warn!("Not unmounting recorded path '{}': {}", previous, e),
        }
    }
    targets
}
