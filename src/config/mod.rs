//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.
//!
//! Environment variables are populated from a ConfigMap using `envFrom` in the
//! deployment. Everything has a default so the controller starts against a
//! local dev Vault without any configuration.

use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
    DEFAULT_METRICS_PORT, DEFAULT_RESYNC_INTERVAL_SECS, DEFAULT_VAULT_ADDR,
    DEFAULT_VAULT_REQUEST_TIMEOUT_SECS,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" | "pretty" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Controller-level configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Vault server address (`VAULT_ADDR`)
    pub vault_address: String,
    /// Static Vault token (`VAULT_TOKEN`)
    /// Ignored when `vault_token_path` is set
    pub vault_token: Option<String>,
    /// File holding the Vault token (`VAULT_TOKEN_PATH`)
    /// Re-read for every reconciliation so rotated tokens are picked up
    pub vault_token_path: Option<PathBuf>,
    /// Timeout applied to each Vault HTTP request
    pub vault_request_timeout_secs: u64,
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: LogFormat,
    /// Maximum concurrent reconciliations per resource kind
    pub max_concurrent_reconciliations: u16,
    /// Requeue interval after a successful reconciliation, 0 disables resync
    pub resync_interval_secs: u64,
    /// Fibonacci backoff starting value (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff cap (seconds)
    pub backoff_max_secs: u64,
    /// Instance name reported on published events
    pub pod_name: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            vault_address: DEFAULT_VAULT_ADDR.to_string(),
            vault_token: None,
            vault_token_path: None,
            vault_request_timeout_secs: DEFAULT_VAULT_REQUEST_TIMEOUT_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_level: "INFO".to_string(),
            log_format: LogFormat::Json,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            pod_name: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let log_format = match non_empty("LOG_FORMAT") {
            Some(raw) => LogFormat::parse(&raw).unwrap_or_else(|| {
                warn!("Unknown LOG_FORMAT '{}', falling back to json", raw);
                LogFormat::Json
            }),
            None => defaults.log_format,
        };

        let backoff_min_secs = parsed_or_default(
            &lookup,
            "BACKOFF_MIN_SECS",
            defaults.backoff_min_secs,
        )
        .max(1);
        let backoff_max_secs =
            parsed_or_default(&lookup, "BACKOFF_MAX_SECS", defaults.backoff_max_secs)
                .max(backoff_min_secs);

        Self {
            vault_address: non_empty("VAULT_ADDR").unwrap_or(defaults.vault_address),
            vault_token: non_empty("VAULT_TOKEN"),
            vault_token_path: non_empty("VAULT_TOKEN_PATH").map(PathBuf::from),
            vault_request_timeout_secs: parsed_or_default(
                &lookup,
                "VAULT_REQUEST_TIMEOUT_SECS",
                defaults.vault_request_timeout_secs,
            ),
            metrics_port: parsed_or_default(&lookup, "METRICS_PORT", defaults.metrics_port),
            log_level: non_empty("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            max_concurrent_reconciliations: parsed_or_default(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            resync_interval_secs: parsed_or_default(
                &lookup,
                "RESYNC_INTERVAL_SECS",
                defaults.resync_interval_secs,
            ),
            backoff_min_secs,
            backoff_max_secs,
            pod_name: non_empty("CONTROLLER_POD_NAME"),
        }
    }

    /// Get Vault request timeout duration
    pub fn vault_request_timeout(&self) -> Duration {
        Duration::from_secs(self.vault_request_timeout_secs)
    }

    /// Get the resync interval, `None` when resync is disabled
    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs))
    }
}

/// Parse an environment value or fall back to the default, warning on garbage
fn parsed_or_default<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid value '{}' for {}, using default {}", raw, key, default);
            default
        }),
        _ => default,
    }
}
