//! # Validation
//!
//! Rejects desired specs Vault would refuse before any remote call is made.
//! Validation only runs on the active path; a resource being deleted is
//! never blocked by a malformed spec.

use super::{MountSettings, VaultPolicySpec};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Capabilities Vault accepts in an ACL path block
pub const POLICY_CAPABILITIES: &[&str] = &[
    "create",
    "read",
    "update",
    "patch",
    "delete",
    "list",
    "sudo",
    "deny",
    "subscribe",
];

const LISTING_VISIBILITY_VALUES: &[&str] = &["unauth", "hidden"];

/// Bare seconds or a Go-style duration ("30s", "1h30m", "1.5h")
static VAULT_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+|(?:\d+(?:\.\d+)?(?:ns|us|µs|ms|s|m|h|d))+)$")
        .expect("Failed to compile duration regex - this should never happen")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required but is empty")]
    MissingField(&'static str),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Invalid duration '{value}' for {field}. Expected seconds or a duration like '30s', '5m', '768h'")]
    InvalidDuration { field: String, value: String },

    #[error("Invalid listingVisibility '{0}'. Must be one of: unauth, hidden")]
    InvalidListingVisibility(String),

    #[error("Policy must declare at least one path")]
    EmptyPolicy,

    #[error("Policy path '{0}' must grant at least one capability")]
    MissingCapabilities(String),

    #[error("Unknown capability '{capability}' on policy path '{path}'")]
    UnknownCapability { path: String, capability: String },
}

pub fn is_vault_duration(value: &str) -> bool {
    VAULT_DURATION.is_match(value.trim())
}

fn validate_duration(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || is_vault_duration(value) {
        return Ok(());
    }
    Err(ValidationError::InvalidDuration {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Validate a mount path
///
/// Leading and trailing slashes are tolerated and stripped by the controller.
pub fn validate_mount_path(path: &str) -> Result<(), ValidationError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("path"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidPath {
            path: path.to_string(),
            reason: "must not contain whitespace",
        });
    }
    if trimmed.split('/').any(|segment| segment == "..") {
        return Err(ValidationError::InvalidPath {
            path: path.to_string(),
            reason: "must not contain '..' segments",
        });
    }
    if trimmed.split('/').any(str::is_empty) {
        return Err(ValidationError::InvalidPath {
            path: path.to_string(),
            reason: "must not contain empty segments",
        });
    }
    Ok(())
}

pub fn validate_mount_settings(settings: &MountSettings) -> Result<(), ValidationError> {
    validate_mount_path(&settings.path)?;
    validate_duration("config.defaultLeaseTTL", &settings.config.default_lease_ttl)?;
    validate_duration("config.maxLeaseTTL", &settings.config.max_lease_ttl)?;

    let visibility = settings.config.listing_visibility.as_str();
    if !visibility.is_empty() && !LISTING_VISIBILITY_VALUES.contains(&visibility) {
        return Err(ValidationError::InvalidListingVisibility(
            visibility.to_string(),
        ));
    }
    Ok(())
}

pub fn validate_policy_spec(spec: &VaultPolicySpec) -> Result<(), ValidationError> {
    if spec.path.is_empty() {
        return Err(ValidationError::EmptyPolicy);
    }

    for (pattern, rule) in &spec.path {
        if pattern.trim().is_empty() {
            return Err(ValidationError::MissingField("path key"));
        }
        if rule.capabilities.is_empty() {
            return Err(ValidationError::MissingCapabilities(pattern.clone()));
        }
        if let Some(unknown) = rule
            .capabilities
            .iter()
            .find(|c| !POLICY_CAPABILITIES.contains(&c.as_str()))
        {
            return Err(ValidationError::UnknownCapability {
                path: pattern.clone(),
                capability: unknown.clone(),
            });
        }
        if let Some(ttl) = &rule.min_wrapping_ttl {
            validate_duration(&format!("path[{pattern}].minWrappingTTL"), ttl)?;
        }
        if let Some(ttl) = &rule.max_wrapping_ttl {
            validate_duration(&format!("path[{pattern}].maxWrappingTTL"), ttl)?;
        }
    }
    Ok(())
}
