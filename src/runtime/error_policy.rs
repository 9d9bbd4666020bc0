//! # Error Policy
//!
//! Retry scheduling for failed reconciliations.
//!
//! Every error is retried. The delay follows a Fibonacci sequence tracked per
//! resource, so one broken manifest backs off without slowing down the others.
//! A successful pass clears the resource's entry.

use crate::controller::reconciler::{resource_key, BackoffState, Reconciler, ReconcilerError};
use crate::crd::ManagedResource;
use crate::observability::metrics;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

/// Advance the backoff for `key`, returning the delay and the error count
pub fn next_backoff(
    states: &Mutex<HashMap<String, BackoffState>>,
    key: &str,
    min_seconds: u64,
    max_seconds: u64,
) -> (u64, u32) {
    match states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(key.to_string())
                .or_insert_with(|| BackoffState::new(min_seconds, max_seconds));
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using minimum backoff", e);
            (min_seconds.max(1), 0)
        }
    }
}

/// Handle reconciliation errors with Fibonacci backoff
pub fn handle_reconciliation_error<K: ManagedResource>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let kind = <K as Resource>::kind(&()).to_string();
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        resource.kind = kind.as_str(),
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        reason = error.reason()
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {} {}/{}: {}", kind, namespace, name, error);
    metrics::increment_reconciliation_errors(&kind, error.reason());

    let (backoff_seconds, error_count) = next_backoff(
        &ctx.backoff_states,
        &resource_key(&kind, &namespace, &name),
        ctx.config.backoff_min_secs,
        ctx.config.backoff_max_secs,
    );

    let next_trigger_time = i64::try_from(backoff_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|delay| chrono::Utc::now().checked_add_signed(delay));
    if let Some(next) = next_trigger_time {
        info!(
            "🔄 Retrying in {}s at {} (error count: {})",
            backoff_seconds,
            next.to_rfc3339(),
            error_count
        );
    }

    metrics::increment_requeues_total(&kind);
    Action::requeue(Duration::from_secs(backoff_seconds))
}
