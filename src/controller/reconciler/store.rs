//! # Resource Store
//!
//! The reconciler's view of the Kubernetes control plane.
//!
//! Every write is a JSON merge patch carrying the `metadata.resourceVersion`
//! the reconciler observed. The API server rejects the patch with 409 Conflict
//! when the object changed in the meantime, and the whole reconciliation is
//! retried from a fresh read.

use super::ReconcilerError;
use crate::crd::{ManagedResource, ObservedStatus};
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use kube_runtime::events::{Event, EventType, Recorder, Reporter};
use serde_json::json;
use std::marker::PhantomData;
use tracing::{debug, warn};

#[async_trait]
pub trait ResourceStore<K: ManagedResource>: Send + Sync {
    /// Fetch the current manifest, `None` if it no longer exists
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ReconcilerError>;

    /// Attach `K::FINALIZER`, returning the updated manifest
    async fn add_finalizer(&self, resource: &K) -> Result<K, ReconcilerError>;

    /// Detach `K::FINALIZER`, releasing the manifest for removal
    async fn remove_finalizer(&self, resource: &K) -> Result<(), ReconcilerError>;

    /// Persist `status` unconditionally
    async fn patch_status(
        &self,
        resource: &K,
        status: &ObservedStatus,
    ) -> Result<(), ReconcilerError>;

    /// Publish a Warning event on the manifest
    ///
    /// Best-effort: failures are logged, never returned.
    async fn record_warning(&self, resource: &K, reason: &str, note: &str);

    /// Persist `status` unless it already matches what the manifest carries
    ///
    /// Returns whether a write was issued. Skipping unchanged status avoids
    /// waking the watcher with an event the controller caused itself.
    async fn update_status(
        &self,
        resource: &K,
        status: &ObservedStatus,
    ) -> Result<bool, ReconcilerError> {
        if resource.observed() == *status {
            debug!("Status of {} unchanged, skipping update", resource.name_any());
            return Ok(false);
        }
        self.patch_status(resource, status).await?;
        Ok(true)
    }
}

/// Kubernetes-backed [`ResourceStore`]
pub struct KubeStore<K> {
    client: Client,
    recorder: Recorder,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    pub fn new(client: Client, reporter: Reporter) -> Self {
        Self {
            recorder: Recorder::new(client.clone(), reporter),
            client,
            _kind: PhantomData,
        }
    }
}

impl<K: ManagedResource> KubeStore<K> {
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn finalizer_patch(resource: &K, finalizers: Vec<String>) -> Patch<serde_json::Value> {
        Patch::Merge(json!({
            "metadata": {
                "resourceVersion": resource.resource_version(),
                "finalizers": finalizers,
            }
        }))
    }
}

#[async_trait]
impl<K: ManagedResource> ResourceStore<K> for KubeStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ReconcilerError> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn add_finalizer(&self, resource: &K) -> Result<K, ReconcilerError> {
        let mut finalizers = resource.finalizers().to_vec();
        finalizers.push(K::FINALIZER.to_string());

        let name = resource.name_any();
        let namespace = resource.namespace().unwrap_or_default();
        self.api(&namespace)
            .patch(
                &name,
                &PatchParams::default(),
                &Self::finalizer_patch(resource, finalizers),
            )
            .await
            .map_err(ReconcilerError::from_write(&name))
    }

    async fn remove_finalizer(&self, resource: &K) -> Result<(), ReconcilerError> {
        let finalizers: Vec<String> = resource
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != K::FINALIZER)
            .cloned()
            .collect();

        let name = resource.name_any();
        let namespace = resource.namespace().unwrap_or_default();
        self.api(&namespace)
            .patch(
                &name,
                &PatchParams::default(),
                &Self::finalizer_patch(resource, finalizers),
            )
            .await
            .map_err(ReconcilerError::from_write(&name))?;
        Ok(())
    }

    async fn patch_status(
        &self,
        resource: &K,
        status: &ObservedStatus,
    ) -> Result<(), ReconcilerError> {
        let mut desired = resource.clone();
        desired.set_observed(status.clone());
        let status_value = serde_json::to_value(&desired)?
            .get("status")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let patch = Patch::Merge(json!({
            "metadata": { "resourceVersion": resource.resource_version() },
            "status": status_value,
        }));

        let name = resource.name_any();
        let namespace = resource.namespace().unwrap_or_default();
        self.api(&namespace)
            .patch_status(&name, &PatchParams::default(), &patch)
            .await
            .map_err(ReconcilerError::from_write(&name))?;
        Ok(())
    }

    async fn record_warning(&self, resource: &K, reason: &str, note: &str) {
        let event = Event {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: Some(note.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self
            .recorder
            .publish(&event, &resource.object_ref(&()))
            .await
        {
            warn!(
                "Failed to publish {} event for {}: {}",
                reason,
                resource.name_any(),
                e
            );
        }
    }
}
