//! Vault REST Client
//!
//! Native HTTP implementation of [`VaultClient`] against the Vault API v1.
//! Uses reqwest with rustls (no OpenSSL dependencies).
//!
//! References:
//! - [Vault HTTP API](https://developer.hashicorp.com/vault/api-docs)
//! - [`/sys/mounts`](https://developer.hashicorp.com/vault/api-docs/system/mounts)

use super::{MountConfigInput, MountOutput, VaultClient, VaultError};
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;
use zeroize::Zeroizing;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Vault error response body
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

/// Vault REST client
pub struct VaultRestClient {
    http_client: Client,
    address: String,
    token: Zeroizing<String>,
    namespace: Option<String>,
}

impl std::fmt::Debug for VaultRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultRestClient")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .field("token", &"***")
            .finish_non_exhaustive()
    }
}

impl VaultRestClient {
    /// Create a client for the Vault server at `address`
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(
        address: &str,
        token: Zeroizing<String>,
        namespace: Option<String>,
        timeout: Duration,
    ) -> Result<Self, VaultError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(VaultError::ClientBuild)?;

        Ok(Self {
            http_client,
            address: address.trim_end_matches('/').to_string(),
            token,
            namespace: namespace.filter(|ns| !ns.is_empty()),
        })
    }

    /// Vault server address without trailing slash
    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    /// Send a request and return the status with the raw body
    async fn send(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(StatusCode, String), VaultError> {
        let start = Instant::now();
        let mut request = self
            .http_client
            .request(method.clone(), self.url(path))
            .header(TOKEN_HEADER, self.token.as_str());

        if let Some(namespace) = &self.namespace {
            request = request.header(NAMESPACE_HEADER, namespace);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("Vault {} {}", method, path);
        let result = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        }
        .await;

        metrics::observe_vault_operation_duration(operation, start.elapsed().as_secs_f64());
        result.map_err(|source| {
            metrics::increment_vault_operation_errors(operation);
            VaultError::Transport {
                path: path.to_string(),
                source,
            }
        })
    }

    /// Turn a non-success response into a [`VaultError::Api`]
    fn api_error(operation: &str, path: &str, status: StatusCode, body: &str) -> VaultError {
        metrics::increment_vault_operation_errors(operation);
        let errors = serde_json::from_str::<ErrorResponse>(body)
            .map(|r| r.errors)
            .ok()
            .filter(|errors| !errors.is_empty())
            .unwrap_or_else(|| vec![body.trim().to_string()]);
        VaultError::Api {
            status: status.as_u16(),
            path: path.to_string(),
            errors,
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(path: &str, body: &str) -> Result<T, VaultError> {
        serde_json::from_str(body).map_err(|source| VaultError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl VaultClient for VaultRestClient {
    async fn read(&self, path: &str) -> Result<Option<serde_json::Value>, VaultError> {
        let (status, body) = self.send("read", Method::GET, path, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::api_error("read", path, status, &body));
        }
        if body.trim().is_empty() {
            return Ok(None);
        }
        Self::decode(path, &body).map(Some)
    }

    async fn write(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>, VaultError> {
        let (status, body) = self
            .send("write", Method::PUT, path, Some(payload))
            .await?;
        if !status.is_success() {
            return Err(Self::api_error("write", path, status, &body));
        }
        if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
            return Ok(None);
        }
        Self::decode(path, &body).map(Some)
    }

    async fn delete(&self, path: &str) -> Result<(), VaultError> {
        let (status, body) = self.send("delete", Method::DELETE, path, None).await?;
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(Self::api_error("delete", path, status, &body))
    }

    async fn list_mounts(&self) -> Result<BTreeMap<String, MountOutput>, VaultError> {
        let path = "sys/mounts";
        let (status, body) = self.send("list_mounts", Method::GET, path, None).await?;
        if !status.is_success() {
            return Err(Self::api_error("list_mounts", path, status, &body));
        }

        let document: serde_json::Value = Self::decode(path, &body)?;
        // Newer Vault versions wrap the listing in `data`, older ones return it at the top level
        let listing = match document.get("data") {
            Some(serde_json::Value::Object(data)) => data.clone(),
            _ => match document {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            },
        };

        let mut mounts = BTreeMap::new();
        for (key, value) in listing {
            // Response envelope fields sit next to the mounts in the legacy layout
            if !key.ends_with('/') || !value.is_object() {
                continue;
            }
            let mount: MountOutput = serde_json::from_value(value)
                .map_err(|source| VaultError::Decode {
                    path: path.to_string(),
                    source,
                })?;
            mounts.insert(key, mount);
        }
        Ok(mounts)
    }

    async fn tune_mount(&self, path: &str, config: &MountConfigInput) -> Result<(), VaultError> {
        let tune_path = format!("sys/mounts/{}/tune", path.trim_matches('/'));
        let payload = serde_json::to_value(config).map_err(|source| VaultError::Decode {
            path: tune_path.clone(),
            source,
        })?;
        let (status, body) = self
            .send("tune_mount", Method::POST, &tune_path, Some(&payload))
            .await?;
        if !status.is_success() {
            return Err(Self::api_error("tune_mount", &tune_path, status, &body));
        }
        Ok(())
    }
}
