//! # Watch Loop
//!
//! Runs one kube-runtime `Controller` per resource kind. kube-runtime keeps at
//! most one reconciliation in flight per object; distinct objects reconcile
//! concurrently up to the configured limit.
//!
//! Watch events only trigger a pass when `metadata.generation` moved. The
//! controller's own finalizer and status patches leave it untouched, so they
//! neither re-issue Vault writes nor cut the error backoff short. Drift is
//! caught by the periodic resync instead.

use crate::controller::reconciler::{
    reconcile, ConvergenceStrategy, MountStrategy, PolicyStrategy, Reconciler,
};
use crate::crd::{VaultKVMount, VaultMount};
use crate::observability::ServerState;
use crate::runtime::error_policy::handle_reconciliation_error;
use futures::StreamExt;
use kube::api::Api;
use kube::{Client, Resource};
use kube_runtime::{controller, predicates, reflector, watcher, Controller, WatchStreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Run all controllers until SIGINT/SIGTERM
///
/// # Errors
/// Currently infallible; the signature leaves room for startup checks
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let shutdown_state = server_state.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, finishing in-flight reconciliations...");
        shutdown_state.set_ready(false);
    });

    server_state.set_ready(true);
    info!("Controllers starting...");

    tokio::join!(
        run_controller::<MountStrategy<VaultMount>>(Api::all(client.clone()), reconciler.clone()),
        run_controller::<MountStrategy<VaultKVMount>>(Api::all(client.clone()), reconciler.clone()),
        run_controller::<PolicyStrategy>(Api::all(client), reconciler),
    );

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
    Ok(())
}

async fn run_controller<S>(api: Api<S::Resource>, reconciler: Arc<Reconciler>)
where
    S: ConvergenceStrategy + Default + 'static,
{
    let kind = <S::Resource as Resource>::kind(&()).to_string();
    let concurrency = reconciler.config.max_concurrent_reconciliations;
    info!("Starting {} controller (concurrency: {})", kind, concurrency);

    let (reader, writer) = reflector::store();
    let changes = watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .predicate_filter(predicates::generation);

    Controller::for_stream(changes, reader)
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(
            reconcile::<S>,
            handle_reconciliation_error::<S::Resource>,
            reconciler,
        )
        .for_each(|result| {
            match result {
                Ok((obj, _)) => debug!("Reconciled {}", obj),
                // Already logged and scheduled by the error policy
                Err(controller::Error::ReconcilerFailed(_, obj)) => {
                    debug!("Reconciliation of {} failed", obj);
                }
                Err(e) => warn!("{} controller stream error: {}", kind, e),
            }
            futures::future::ready(())
        })
        .await;

    info!("{} controller stopped", kind);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
