//! # Vault Config Controller
//!
//! Watches `VaultMount`, `VaultKVMount` and `VaultPolicy` resources in all
//! namespaces and applies them to Vault.
//!
//! Configuration comes from environment variables (see `config`). Metrics and
//! probes are served on `METRICS_PORT` (`/metrics`, `/healthz`, `/readyz`).

use anyhow::Result;
use vault_config_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init.client, init.reconciler, init.server_state).await
}
