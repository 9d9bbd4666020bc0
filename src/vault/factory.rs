//! Token-based client factory.
//!
//! Builds a fresh [`VaultRestClient`] for every reconciliation. The token is
//! either fixed at startup or re-read from a file on each call, which lets a
//! sidecar (Vault agent, CSI driver) rotate it without restarting the controller.

use super::{AuthRef, ClientFactory, VaultClient, VaultError, VaultRestClient};
use crate::config::ControllerConfig;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

/// Where the Vault token comes from
pub enum TokenSource {
    /// Token supplied once at startup
    Static(Zeroizing<String>),
    /// Token file re-read for every client
    File(PathBuf),
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => f.write_str("Static(***)"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl TokenSource {
    async fn token(&self) -> Result<Zeroizing<String>, VaultError> {
        let token = match self {
            Self::Static(token) => token.clone(),
            Self::File(path) => {
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                    VaultError::MissingToken(format!(
                        "failed to read token file {}: {e}",
                        path.display()
                    ))
                })?;
                Zeroizing::new(raw.trim().to_string())
            }
        };

        if token.is_empty() {
            return Err(VaultError::MissingToken("token is empty".to_string()));
        }
        Ok(token)
    }
}

/// [`ClientFactory`] handing out token-authenticated REST clients
#[derive(Debug)]
pub struct TokenClientFactory {
    address: String,
    token_source: TokenSource,
    timeout: Duration,
}

impl TokenClientFactory {
    pub fn new(address: impl Into<String>, token_source: TokenSource, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            token_source,
            timeout,
        }
    }

    /// Build the factory from controller configuration
    ///
    /// # Errors
    /// Returns an error when neither `VAULT_TOKEN_PATH` nor `VAULT_TOKEN` is set
    pub fn from_config(config: &ControllerConfig) -> Result<Self, VaultError> {
        let token_source = match (&config.vault_token_path, &config.vault_token) {
            (Some(path), _) => TokenSource::File(path.clone()),
            (None, Some(token)) => TokenSource::Static(Zeroizing::new(token.clone())),
            (None, None) => {
                return Err(VaultError::MissingToken(
                    "set VAULT_TOKEN_PATH or VAULT_TOKEN".to_string(),
                ))
            }
        };
        Ok(Self::new(
            config.vault_address.clone(),
            token_source,
            config.vault_request_timeout(),
        ))
    }
}

#[async_trait]
impl ClientFactory for TokenClientFactory {
    async fn client_for(&self, auth_ref: &AuthRef) -> Result<Arc<dyn VaultClient>, VaultError> {
        debug!(
            "Creating Vault client for auth ref {}/{} (vault namespace: {:?})",
            auth_ref.namespace, auth_ref.name, auth_ref.vault_namespace
        );
        let token = self.token_source.token().await?;
        let client = VaultRestClient::new(
            &self.address,
            token,
            auth_ref.vault_namespace.clone(),
            self.timeout,
        )?;
        Ok(Arc::new(client))
    }
}
