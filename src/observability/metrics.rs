//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `vault_config_reconciliations_total{kind}` - Total number of reconciliations
//! - `vault_config_reconciliation_errors_total{kind, reason}` - Total number of reconciliation errors
//! - `vault_config_reconciliation_duration_seconds{kind}` - Duration of reconciliation operations
//! - `vault_config_requeues_total{kind}` - Total number of error requeues scheduled
//! - `vault_config_finalizers_removed_total{kind}` - Deletions completed in Vault
//! - `vault_config_vault_operations_total{operation}` - Total number of Vault API calls
//! - `vault_config_vault_operation_errors_total{operation}` - Total number of failed Vault API calls
//! - `vault_config_vault_operation_duration_seconds{operation}` - Duration of Vault API calls

use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_config_reconciliations_total",
            "Total number of reconciliations by resource kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_config_reconciliation_errors_total",
            "Total number of reconciliation errors by resource kind and reason",
        ),
        &["kind", "reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "vault_config_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_config_requeues_total",
            "Total number of error requeues by resource kind",
        ),
        &["kind"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static FINALIZERS_REMOVED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_config_finalizers_removed_total",
            "Total number of finalizers removed after the Vault object was deleted",
        ),
        &["kind"],
    )
    .expect("Failed to create FINALIZERS_REMOVED_TOTAL metric - this should never happen")
});

static VAULT_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_config_vault_operations_total",
            "Total number of Vault API operations",
        ),
        &["operation"],
    )
    .expect("Failed to create VAULT_OPERATIONS_TOTAL metric - this should never happen")
});

static VAULT_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_config_vault_operation_errors_total",
            "Total number of failed Vault API operations",
        ),
        &["operation"],
    )
    .expect("Failed to create VAULT_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static VAULT_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "vault_config_vault_operation_duration_seconds",
            "Duration of Vault API operations in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["operation"],
    )
    .expect("Failed to create VAULT_OPERATION_DURATION metric - this should never happen")
});

/// Register every metric with the shared registry
///
/// # Errors
/// Returns an error if a metric is registered twice
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FINALIZERS_REMOVED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_OPERATION_DURATION.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str, reason: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[kind, reason])
        .inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn increment_requeues_total(kind: &str) {
    REQUEUES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_finalizers_removed(kind: &str) {
    FINALIZERS_REMOVED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record one Vault API call, successful or not
pub fn observe_vault_operation_duration(operation: &str, duration: f64) {
    VAULT_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
    VAULT_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_vault_operation_errors(operation: &str) {
    VAULT_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}
