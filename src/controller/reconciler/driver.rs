//! # Reconcile Driver
//!
//! Per-event glue: fetch the manifest, get a Vault client for it, route it
//! through the lifecycle and persist the outcome.
//!
//! Status is two-phase. A pass starts from `valid = false` and only reports
//! `valid = true` once every Vault call, rename cleanup included, succeeded.
//! On failure the previously recorded identity is kept so the next pass can
//! still see a pending rename.

use super::convergence::{converge, ConvergenceOutcome, ConvergenceStrategy};
use super::lifecycle::{ensure_finalizer, finalize, lifecycle_state, LifecycleState};
use super::store::{KubeStore, ResourceStore};
use super::types::{resource_key, Reconciler};
use super::ReconcilerError;
use crate::crd::{ManagedResource, ObservedStatus};
use crate::observability::metrics;
use crate::vault::{ClientFactory, VaultClient};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

/// What a reconciliation pass ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The manifest no longer exists
    Missing,
    /// Being deleted without our finalizer; nothing left to do
    Released,
    /// Vault object deleted and finalizer removed
    Finalized,
    /// Vault matches the desired spec
    Converged(ConvergenceOutcome),
}

/// Reconcile the manifest `namespace/name` once
///
/// # Errors
/// Every error is retryable; the caller schedules the retry.
pub async fn reconcile_resource<S: ConvergenceStrategy>(
    strategy: &S,
    store: &dyn ResourceStore<S::Resource>,
    factory: &dyn ClientFactory,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let Some(resource) = store.get(namespace, name).await? else {
        debug!("{}/{} no longer exists, nothing to do", namespace, name);
        return Ok(ReconcileOutcome::Missing);
    };

    if lifecycle_state(&resource) == LifecycleState::Gone {
        debug!(
            "{}/{} is being deleted and carries no finalizer of ours",
            namespace, name
        );
        return Ok(ReconcileOutcome::Released);
    }

    let auth_ref = resource.auth_ref();
    let client = match factory.client_for(&auth_ref).await {
        Ok(client) => client,
        Err(source) => {
            let err = ReconcilerError::ClientConfig {
                auth_ref: format!("{}/{}", auth_ref.namespace, auth_ref.name),
                source,
            };
            report_failure(store, &resource, &err).await;
            return Err(err);
        }
    };

    if lifecycle_state(&resource) == LifecycleState::Deleting {
        if let Err(err) = finalize(strategy, store, client.as_ref(), &resource).await {
            store
                .record_warning(&resource, err.reason(), &err.to_string())
                .await;
            return Err(err);
        }
        return Ok(ReconcileOutcome::Finalized);
    }

    let resource = ensure_finalizer(store, resource).await?;
    converge_active(strategy, store, client.as_ref(), &resource)
        .await
        .map(ReconcileOutcome::Converged)
}

async fn converge_active<S: ConvergenceStrategy>(
    strategy: &S,
    store: &dyn ResourceStore<S::Resource>,
    client: &dyn VaultClient,
    resource: &S::Resource,
) -> Result<ConvergenceOutcome, ReconcilerError> {
    let result = match resource.validate() {
        Ok(()) => converge(strategy, client, resource).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(outcome) => {
            let status = ObservedStatus {
                valid: true,
                error: String::new(),
                identity: outcome.identity.clone(),
            };
            store.update_status(resource, &status).await?;
            Ok(outcome)
        }
        Err(err) => {
            report_failure(store, resource, &err).await;
            Err(err)
        }
    }
}

/// Surface a failure on the manifest: Warning event plus invalid status
///
/// Best-effort; the original error is what gets retried.
async fn report_failure<K: ManagedResource>(
    store: &dyn ResourceStore<K>,
    resource: &K,
    err: &ReconcilerError,
) {
    let message = err.to_string();
    store.record_warning(resource, err.reason(), &message).await;

    let status = ObservedStatus {
        valid: false,
        error: message,
        identity: resource.observed().identity,
    };
    if let Err(e) = store.update_status(resource, &status).await {
        warn!(
            "Failed to record error status on {}: {}",
            resource.name_any(),
            e
        );
    }
}

/// Requeue policy after a successful pass
pub fn action_for(outcome: &ReconcileOutcome, resync_interval: Option<Duration>) -> Action {
    match (outcome, resync_interval) {
        (ReconcileOutcome::Converged(_), Some(interval)) => Action::requeue(interval),
        _ => Action::await_change(),
    }
}

/// Controller entry point for one resource kind
pub async fn reconcile<S>(
    resource: Arc<S::Resource>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError>
where
    S: ConvergenceStrategy + Default,
{
    let kind = <S::Resource as Resource>::kind(&()).to_string();
    let name = resource.name_any();
    let namespace = resource.namespace().unwrap_or_default();

    let span = info_span!(
        "reconcile",
        kind = kind.as_str(),
        namespace = namespace.as_str(),
        name = name.as_str()
    );

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations(&kind);

        let store = KubeStore::<S::Resource>::new(ctx.client.clone(), ctx.reporter.clone());
        let strategy = S::default();
        let result = reconcile_resource(
            &strategy,
            &store,
            ctx.vault_factory.as_ref(),
            &namespace,
            &name,
        )
        .await;
        metrics::observe_reconciliation_duration(&kind, start.elapsed().as_secs_f64());

        let outcome = result?;
        ctx.reset_backoff(&resource_key(&kind, &namespace, &name));

        match &outcome {
            ReconcileOutcome::Converged(converged) => match &converged.renamed_from {
                Some(old) => info!(
                    "✅ {} converged at '{}' (moved from '{}')",
                    kind, converged.identity, old
                ),
                None => info!("✅ {} converged at '{}'", kind, converged.identity),
            },
            ReconcileOutcome::Finalized => info!("🗑️  {} deleted from Vault", kind),
            ReconcileOutcome::Missing | ReconcileOutcome::Released => {}
        }

        Ok(action_for(&outcome, ctx.config.resync_interval()))
    }
    .instrument(span)
    .await
}
