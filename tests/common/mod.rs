//! Common test utilities
//!
//! Provides rustls initialization for the Pact tests and in-memory stand-ins
//! for Vault and the Kubernetes API used by the reconciliation tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use vault_config_controller::controller::reconciler::{ReconcilerError, ResourceStore};
use vault_config_controller::crd::{
    ManagedResource, ObservedStatus, VaultKVMount, VaultMount, VaultPolicy,
};
use vault_config_controller::vault::{
    mount_key, AuthRef, ClientFactory, MountConfigInput, MountOutput, VaultClient, VaultError,
};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` so it only runs once per test binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

pub const NAMESPACE: &str = "team-a";
const API_VERSION: &str = "vault.octopilot.io/v1alpha1";
const DELETION_TIMESTAMP: &str = "2026-01-01T00:00:00Z";

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// One call received by [`FakeVault`], paths without the leading slash
#[derive(Debug, Clone, PartialEq)]
pub enum VaultCall {
    Read(String),
    Write(String, Value),
    Delete(String),
    ListMounts,
    TuneMount(String, MountConfigInput),
}

#[derive(Default)]
struct VaultState {
    mounts: BTreeMap<String, MountOutput>,
    documents: BTreeMap<String, Value>,
    calls: Vec<VaultCall>,
    failing_deletes: BTreeSet<String>,
}

/// In-memory Vault that understands `sys/mounts` and plain documents
#[derive(Default)]
pub struct FakeVault {
    state: Mutex<VaultState>,
}

fn normalize(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

fn api_error(status: u16, path: &str, message: &str) -> VaultError {
    VaultError::Api {
        status,
        path: path.to_string(),
        errors: vec![message.to_string()],
    }
}

impl FakeVault {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pretend a mount already exists at `path`
    pub fn seed_mount(&self, path: &str, mount_type: &str) {
        self.state.lock().unwrap().mounts.insert(
            mount_key(path),
            MountOutput {
                mount_type: mount_type.to_string(),
                ..MountOutput::default()
            },
        );
    }

    pub fn has_mount(&self, path: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .mounts
            .contains_key(&mount_key(path))
    }

    pub fn mount(&self, path: &str) -> Option<MountOutput> {
        self.state
            .lock()
            .unwrap()
            .mounts
            .get(&mount_key(path))
            .cloned()
    }

    pub fn document(&self, path: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .documents
            .get(&normalize(path))
            .cloned()
    }

    /// Make every delete of `path` fail with a server error
    pub fn fail_deletes_of(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(normalize(path));
    }

    pub fn allow_all_deletes(&self) {
        self.state.lock().unwrap().failing_deletes.clear();
    }

    pub fn calls(&self) -> Vec<VaultCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Calls that change Vault state
    pub fn mutating_calls(&self) -> Vec<VaultCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, VaultCall::Read(_) | VaultCall::ListMounts))
            .collect()
    }
}

#[async_trait]
impl VaultClient for FakeVault {
    async fn read(&self, path: &str) -> Result<Option<Value>, VaultError> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        state.calls.push(VaultCall::Read(path.clone()));
        Ok(state.documents.get(&path).cloned())
    }

    async fn write(&self, path: &str, payload: &Value) -> Result<Option<Value>, VaultError> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(VaultCall::Write(path.clone(), payload.clone()));

        if let Some(mount_path) = path.strip_prefix("sys/mounts/") {
            let key = mount_key(mount_path);
            if state.mounts.contains_key(&key) {
                return Err(api_error(
                    400,
                    &path,
                    &format!("path is already in use at {key}"),
                ));
            }
            let output: MountOutput = serde_json::from_value(payload.clone())
                .map_err(|source| VaultError::Decode {
                    path: path.clone(),
                    source,
                })?;
            state.mounts.insert(key, output);
        } else {
            state.documents.insert(path, payload.clone());
        }
        Ok(None)
    }

    async fn delete(&self, path: &str) -> Result<(), VaultError> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        state.calls.push(VaultCall::Delete(path.clone()));

        if state.failing_deletes.contains(&path) {
            return Err(api_error(500, &path, "internal error"));
        }
        match path.strip_prefix("sys/mounts/") {
            Some(mount_path) => {
                state.mounts.remove(&mount_key(mount_path));
            }
            None => {
                state.documents.remove(&path);
            }
        }
        Ok(())
    }

    async fn list_mounts(&self) -> Result<BTreeMap<String, MountOutput>, VaultError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VaultCall::ListMounts);
        Ok(state.mounts.clone())
    }

    async fn tune_mount(&self, path: &str, config: &MountConfigInput) -> Result<(), VaultError> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(VaultCall::TuneMount(path.clone(), config.clone()));

        let key = mount_key(&path);
        let Some(mount) = state.mounts.get_mut(&key) else {
            return Err(api_error(
                400,
                &format!("sys/mounts/{path}/tune"),
                &format!("cannot tune '{key}': no mount at this path"),
            ));
        };
        if let Some(description) = &config.description {
            mount.description = description.clone();
        }
        if !config.options.is_empty() {
            mount
                .options
                .get_or_insert_with(BTreeMap::new)
                .extend(config.options.clone());
        }
        Ok(())
    }
}

/// [`ClientFactory`] handing out a shared [`FakeVault`]
pub struct FakeFactory {
    vault: Arc<FakeVault>,
    failing: AtomicBool,
    requests: Mutex<Vec<AuthRef>>,
}

impl FakeFactory {
    pub fn new(vault: Arc<FakeVault>) -> Self {
        Self {
            vault,
            failing: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<AuthRef> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn client_for(&self, auth_ref: &AuthRef) -> Result<Arc<dyn VaultClient>, VaultError> {
        self.requests.lock().unwrap().push(auth_ref.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(VaultError::MissingToken(format!(
                "no credentials for {}/{}",
                auth_ref.namespace, auth_ref.name
            )));
        }
        let client: Arc<dyn VaultClient> = self.vault.clone();
        Ok(client)
    }
}

// ---------------------------------------------------------------------------
// Kubernetes
// ---------------------------------------------------------------------------

type Edit<K> = Box<dyn FnOnce(&mut K) + Send>;

struct StoreState<K> {
    object: Option<K>,
    resource_version: u64,
    status_writes: usize,
    events: Vec<(String, String)>,
    /// Applied right after the next `get` hands out its copy
    concurrent_edit: Option<Edit<K>>,
}

impl<K: ManagedResource> StoreState<K> {
    fn empty() -> Self {
        Self {
            object: None,
            resource_version: 1,
            status_writes: 0,
            events: Vec::new(),
            concurrent_edit: None,
        }
    }

    fn bump(&mut self) -> Option<&mut K> {
        self.resource_version += 1;
        let version = self.resource_version.to_string();
        let object = self.object.as_mut()?;
        object.meta_mut().resource_version = Some(version);
        Some(object)
    }

    /// Reject writes based on a stale read, like the API server's 409
    fn check_fresh(&self, resource: &K) -> Result<(), ReconcilerError> {
        let current = self
            .object
            .as_ref()
            .and_then(|object| object.resource_version());
        if current.is_none() || current != resource.resource_version() {
            return Err(ReconcilerError::Conflict(resource.name_any()));
        }
        Ok(())
    }
}

/// Single-object stand-in for the Kubernetes API
///
/// Behaves like the API server where it matters: finalizers block removal of
/// a deleted object, every write bumps `resourceVersion`, and a write carrying
/// an outdated `resourceVersion` fails with a conflict.
pub struct FakeStore<K> {
    state: Mutex<StoreState<K>>,
}

impl<K: ManagedResource> FakeStore<K> {
    pub fn new(mut object: K) -> Self {
        let mut store = StoreState::empty();
        object.meta_mut().resource_version = Some(store.resource_version.to_string());
        store.object = Some(object);
        Self {
            state: Mutex::new(store),
        }
    }

    pub fn empty() -> Self {
        Self {
            state: Mutex::new(StoreState::empty()),
        }
    }

    pub fn object(&self) -> Option<K> {
        self.state.lock().unwrap().object.clone()
    }

    /// Edit the stored manifest the way `kubectl apply` would
    pub fn edit(&self, change: impl FnOnce(&mut K)) {
        if let Some(object) = self.state.lock().unwrap().bump() {
            change(object);
        }
    }

    /// Edit the manifest while the next pass is working on its copy
    pub fn edit_during_next_pass(&self, change: impl FnOnce(&mut K) + Send + 'static) {
        self.state.lock().unwrap().concurrent_edit = Some(Box::new(change));
    }

    /// Request deletion; the object stays until its finalizers are gone
    pub fn request_deletion(&self) {
        let mut state = self.state.lock().unwrap();
        let remove = match state.object.as_mut() {
            Some(object) => {
                object.meta_mut().deletion_timestamp = Some(
                    serde_json::from_value(json!(DELETION_TIMESTAMP))
                        .expect("valid timestamp"),
                );
                object.finalizers().is_empty()
            }
            None => false,
        };
        if remove {
            state.object = None;
        }
    }

    pub fn status(&self) -> ObservedStatus {
        self.object()
            .map(|object| object.observed())
            .unwrap_or_default()
    }

    pub fn status_writes(&self) -> usize {
        self.state.lock().unwrap().status_writes
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn has_finalizer(&self) -> bool {
        self.object()
            .is_some_and(|object| object.finalizers().iter().any(|f| f == K::FINALIZER))
    }
}

#[async_trait]
impl<K: ManagedResource> ResourceStore<K> for FakeStore<K> {
    async fn get(&self, _namespace: &str, _name: &str) -> Result<Option<K>, ReconcilerError> {
        let mut state = self.state.lock().unwrap();
        let current = state.object.clone();
        if let Some(change) = state.concurrent_edit.take() {
            if let Some(object) = state.bump() {
                change(object);
            }
        }
        Ok(current)
    }

    async fn add_finalizer(&self, resource: &K) -> Result<K, ReconcilerError> {
        let mut state = self.state.lock().unwrap();
        state.check_fresh(resource)?;
        let object = state
            .bump()
            .ok_or_else(|| ReconcilerError::Conflict(resource.name_any()))?;
        object.finalizers_mut().push(K::FINALIZER.to_string());
        Ok(object.clone())
    }

    async fn remove_finalizer(&self, resource: &K) -> Result<(), ReconcilerError> {
        let mut state = self.state.lock().unwrap();
        state.check_fresh(resource)?;
        let released = match state.bump() {
            Some(object) => {
                object.finalizers_mut().retain(|f| f != K::FINALIZER);
                object.meta().deletion_timestamp.is_some() && object.finalizers().is_empty()
            }
            None => false,
        };
        if released {
            state.object = None;
        }
        Ok(())
    }

    async fn patch_status(
        &self,
        resource: &K,
        status: &ObservedStatus,
    ) -> Result<(), ReconcilerError> {
        let mut state = self.state.lock().unwrap();
        state.check_fresh(resource)?;
        if let Some(object) = state.bump() {
            object.set_observed(status.clone());
        }
        state.status_writes += 1;
        Ok(())
    }

    async fn record_warning(&self, _resource: &K, reason: &str, note: &str) {
        self.state
            .lock()
            .unwrap()
            .events
            .push((reason.to_string(), note.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Manifests
// ---------------------------------------------------------------------------

fn manifest(kind: &str, name: &str, spec: Value) -> Value {
    json!({
        "apiVersion": API_VERSION,
        "kind": kind,
        "metadata": {
            "name": name,
            "namespace": NAMESPACE,
        },
        "spec": spec,
    })
}

pub fn vault_mount(name: &str, spec: Value) -> VaultMount {
    serde_json::from_value(manifest("VaultMount", name, spec)).expect("valid VaultMount")
}

pub fn vault_kv_mount(name: &str, spec: Value) -> VaultKVMount {
    serde_json::from_value(manifest("VaultKVMount", name, spec)).expect("valid VaultKVMount")
}

pub fn vault_policy(name: &str, spec: Value) -> VaultPolicy {
    serde_json::from_value(manifest("VaultPolicy", name, spec)).expect("valid VaultPolicy")
}
