//! Reconciliation tests for `VaultMount` and `VaultKVMount`
//!
//! Drive the reconcile driver against the in-memory Vault and store from
//! `common`, checking the Vault calls issued and the status left behind.

mod common;

use common::{
    vault_kv_mount, vault_mount, FakeFactory, FakeStore, FakeVault, VaultCall, NAMESPACE,
};
use kube::{Resource, ResourceExt};
use serde_json::json;
use vault_config_controller::controller::reconciler::{
    reconcile_resource, ConvergenceStrategy, Existence, MountStrategy, ReconcileOutcome,
    ReconcilerError,
};
use vault_config_controller::crd::{ManagedResource, VaultKVMount, VaultMount};
use vault_config_controller::vault::AuthRef;

async fn run<S>(
    store: &FakeStore<S::Resource>,
    factory: &FakeFactory,
) -> Result<ReconcileOutcome, ReconcilerError>
where
    S: ConvergenceStrategy + Default,
{
    reconcile_resource(&S::default(), store, factory, NAMESPACE, "team-pki").await
}

async fn run_mount(
    store: &FakeStore<VaultMount>,
    factory: &FakeFactory,
) -> Result<ReconcileOutcome, ReconcilerError> {
    run::<MountStrategy<VaultMount>>(store, factory).await
}

fn pki_mount(path: &str) -> VaultMount {
    vault_mount(
        "team-pki",
        json!({
            "type": "pki",
            "path": path,
            "description": "Team A issuing CA",
            "config": {"maxLeaseTTL": "8760h"}
        }),
    )
}

fn setup(path: &str) -> (std::sync::Arc<FakeVault>, FakeFactory, FakeStore<VaultMount>) {
    let vault = FakeVault::new();
    let factory = FakeFactory::new(vault.clone());
    let store = FakeStore::new(pki_mount(path));
    (vault, factory, store)
}

fn converged(outcome: ReconcileOutcome) -> (String, Existence, Option<String>) {
    match outcome {
        ReconcileOutcome::Converged(outcome) => {
            (outcome.identity, outcome.existence, outcome.renamed_from)
        }
        other => panic!("expected a converged outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_absent_mount_is_created() {
    let (vault, factory, store) = setup("team-a/pki");

    let outcome = run_mount(&store, &factory).await.unwrap();

    let (identity, existence, renamed_from) = converged(outcome);
    assert_eq!(identity, "team-a/pki");
    assert_eq!(existence, Existence::Absent);
    assert_eq!(renamed_from, None);

    let calls = vault.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], VaultCall::ListMounts);
    let VaultCall::Write(path, payload) = &calls[1] else {
        panic!("expected a mount write, got {:?}", calls[1]);
    };
    assert_eq!(path, "sys/mounts/team-a/pki");
    assert_eq!(payload["type"], "pki");
    assert_eq!(payload["description"], "Team A issuing CA");
    assert_eq!(payload["config"]["max_lease_ttl"], "8760h");
    assert_eq!(payload["config"]["listing_visibility"], "hidden");
    assert!(payload["config"].get("description").is_none());

    assert_eq!(vault.mount("team-a/pki").unwrap().mount_type, "pki");
    assert!(store.has_finalizer());
    let status = store.status();
    assert!(status.valid);
    assert!(status.error.is_empty());
    assert_eq!(status.identity, "team-a/pki");
}

#[tokio::test]
async fn test_existing_mount_is_tuned_not_recreated() {
    let (vault, factory, store) = setup("team-a/pki");
    vault.seed_mount("team-a/pki", "pki");

    let (_, existence, _) = converged(run_mount(&store, &factory).await.unwrap());
    assert_eq!(existence, Existence::Present);

    let mutating = vault.mutating_calls();
    assert_eq!(mutating.len(), 1);
    let VaultCall::TuneMount(path, config) = &mutating[0] else {
        panic!("expected a tune, got {:?}", mutating[0]);
    };
    assert_eq!(path, "team-a/pki");
    assert_eq!(config.max_lease_ttl, "8760h");
    assert_eq!(config.description.as_deref(), Some("Team A issuing CA"));
    assert!(store.status().valid);
}

#[tokio::test]
async fn test_second_pass_is_idempotent() {
    let (vault, factory, store) = setup("team-a/pki");

    run_mount(&store, &factory).await.unwrap();
    assert_eq!(store.status_writes(), 1);
    vault.clear_calls();

    run_mount(&store, &factory).await.unwrap();

    // Tune instead of a second create, and no status write for an unchanged status
    assert!(matches!(
        vault.mutating_calls().as_slice(),
        [VaultCall::TuneMount(path, _)] if path == "team-a/pki"
    ));
    assert_eq!(store.status_writes(), 1);
    assert!(store.status().valid);
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn test_leading_and_trailing_slashes_are_ignored() {
    let (vault, factory, store) = setup("/team-a/pki/");

    let (identity, _, _) = converged(run_mount(&store, &factory).await.unwrap());

    assert_eq!(identity, "team-a/pki");
    assert!(vault.has_mount("team-a/pki"));
    assert_eq!(store.status().identity, "team-a/pki");
}

#[tokio::test]
async fn test_path_change_creates_new_then_removes_old() {
    let (vault, factory, store) = setup("team-a/pki");
    run_mount(&store, &factory).await.unwrap();
    vault.clear_calls();

    store.edit(|mount| mount.spec.settings.path = "team-a/pki-v2".to_string());
    let (identity, existence, renamed_from) =
        converged(run_mount(&store, &factory).await.unwrap());

    assert_eq!(identity, "team-a/pki-v2");
    assert_eq!(existence, Existence::Absent);
    assert_eq!(renamed_from.as_deref(), Some("team-a/pki"));

    let mutating = vault.mutating_calls();
    assert_eq!(mutating.len(), 2);
    assert!(matches!(&mutating[0], VaultCall::Write(path, _) if path == "sys/mounts/team-a/pki-v2"));
    assert_eq!(
        mutating[1],
        VaultCall::Delete("sys/mounts/team-a/pki".to_string())
    );

    assert!(vault.has_mount("team-a/pki-v2"));
    assert!(!vault.has_mount("team-a/pki"));
    let status = store.status();
    assert!(status.valid);
    assert_eq!(status.identity, "team-a/pki-v2");
}

#[tokio::test]
async fn test_failed_cleanup_of_old_path_is_retried() {
    let (vault, factory, store) = setup("team-a/pki");
    run_mount(&store, &factory).await.unwrap();

    vault.fail_deletes_of("/sys/mounts/team-a/pki");
    store.edit(|mount| mount.spec.settings.path = "team-a/pki-v2".to_string());

    let err = run_mount(&store, &factory).await.unwrap_err();
    assert!(matches!(
        &err,
        ReconcilerError::StaleCleanup { identity, .. } if identity == "team-a/pki"
    ));

    // The new mount exists, but the old path is still the recorded identity
    assert!(vault.has_mount("team-a/pki-v2"));
    assert!(vault.has_mount("team-a/pki"));
    let status = store.status();
    assert!(!status.valid);
    assert_eq!(status.identity, "team-a/pki");
    assert!(status.error.contains("team-a/pki"));
    let events = store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "ReconcileFailed");

    vault.allow_all_deletes();
    vault.clear_calls();
    let (identity, existence, renamed_from) =
        converged(run_mount(&store, &factory).await.unwrap());

    assert_eq!(identity, "team-a/pki-v2");
    assert_eq!(existence, Existence::Present);
    assert_eq!(renamed_from.as_deref(), Some("team-a/pki"));
    let mutating = vault.mutating_calls();
    assert!(matches!(&mutating[0], VaultCall::TuneMount(path, _) if path == "team-a/pki-v2"));
    assert_eq!(
        mutating[1],
        VaultCall::Delete("sys/mounts/team-a/pki".to_string())
    );
    assert!(!vault.has_mount("team-a/pki"));

    let status = store.status();
    assert!(status.valid);
    assert!(status.error.is_empty());
    assert_eq!(status.identity, "team-a/pki-v2");
}

#[tokio::test]
async fn test_invalid_edit_keeps_previous_identity() {
    let (vault, factory, store) = setup("team-a/pki");
    run_mount(&store, &factory).await.unwrap();

    store.edit(|mount| mount.spec.mount_type = String::new());
    let err = run_mount(&store, &factory).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::InvalidSpec(_)));

    let status = store.status();
    assert!(!status.valid);
    assert_eq!(status.identity, "team-a/pki");
    assert!(vault.has_mount("team-a/pki"));
}

#[tokio::test]
async fn test_invalid_path_is_rejected_without_vault_calls() {
    let (vault, factory, store) = setup("team-a/../pki");

    let err = run_mount(&store, &factory).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::InvalidSpec(_)));
    assert!(vault.calls().is_empty());
    let events = store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "InvalidSpec");
    let status = store.status();
    assert!(!status.valid);
    assert!(status.error.starts_with("Invalid spec"));
}

#[tokio::test]
async fn test_deleting_invalid_path_never_touches_other_mounts() {
    let (vault, factory, store) = setup("team-a/../secret");
    vault.seed_mount("secret", "kv");

    let err = run_mount(&store, &factory).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::InvalidSpec(_)));
    assert!(store.has_finalizer());

    vault.clear_calls();
    store.request_deletion();
    assert_eq!(
        run_mount(&store, &factory).await.unwrap(),
        ReconcileOutcome::Finalized
    );

    assert!(vault.calls().is_empty());
    assert!(vault.has_mount("secret"));
    assert!(store.object().is_none());
}

#[tokio::test]
async fn test_deleting_after_invalid_edit_removes_only_the_applied_path() {
    let (vault, factory, store) = setup("team-a/pki");
    vault.seed_mount("secret", "kv");
    run_mount(&store, &factory).await.unwrap();

    store.edit(|mount| mount.spec.settings.path = "team-a/../secret".to_string());
    run_mount(&store, &factory).await.unwrap_err();
    vault.clear_calls();

    store.request_deletion();
    assert_eq!(
        run_mount(&store, &factory).await.unwrap(),
        ReconcileOutcome::Finalized
    );

    assert_eq!(
        vault.calls(),
        vec![VaultCall::Delete("sys/mounts/team-a/pki".to_string())]
    );
    assert!(!vault.has_mount("team-a/pki"));
    assert!(vault.has_mount("secret"));
}

#[tokio::test]
async fn test_omitted_config_tunes_listing_visibility_to_hidden() {
    let vault = FakeVault::new();
    vault.seed_mount("transit", "transit");
    let factory = FakeFactory::new(vault.clone());
    let store = FakeStore::new(vault_mount(
        "team-pki",
        json!({"type": "transit", "path": "transit"}),
    ));

    run_mount(&store, &factory).await.unwrap();

    let VaultCall::TuneMount(_, config) = &vault.mutating_calls()[0] else {
        panic!("expected a tune");
    };
    assert_eq!(config.listing_visibility, "hidden");
}

#[tokio::test]
async fn test_concurrent_edit_fails_status_write_and_retries_cleanly() {
    let (vault, factory, store) = setup("team-a/pki");
    store.edit(|mount| {
        mount
            .finalizers_mut()
            .push(VaultMount::FINALIZER.to_string());
    });
    store.edit_during_next_pass(|mount: &mut VaultMount| {
        mount.spec.settings.description = "Rotated CA".to_string();
    });

    let err = run_mount(&store, &factory).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Conflict(ref name) if name == "team-pki"));
    assert_eq!(store.status_writes(), 0);
    assert!(!store.status().valid);
    assert!(vault.has_mount("team-a/pki"));

    // The retry starts from the edited manifest and tunes what the first pass created
    vault.clear_calls();
    let (_, existence, _) = converged(run_mount(&store, &factory).await.unwrap());

    assert_eq!(existence, Existence::Present);
    let VaultCall::TuneMount(_, config) = &vault.mutating_calls()[0] else {
        panic!("expected a tune");
    };
    assert_eq!(config.description.as_deref(), Some("Rotated CA"));
    assert_eq!(store.status_writes(), 1);
    let status = store.status();
    assert!(status.valid);
    assert_eq!(status.identity, "team-a/pki");
}

#[tokio::test]
async fn test_client_config_failure_is_reported() {
    let (vault, factory, store) = setup("team-a/pki");
    factory.set_failing(true);

    let err = run_mount(&store, &factory).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::ClientConfig { .. }));
    assert!(vault.calls().is_empty());
    assert!(!store.has_finalizer());
    let events = store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "VaultClientConfigError");
    assert!(events[0].1.contains("Failed to get Vault auth login"));
    let status = store.status();
    assert!(!status.valid);
    assert!(status.error.contains("team-a/default"));

    // Recovers on the next pass once credentials are available
    factory.set_failing(false);
    run_mount(&store, &factory).await.unwrap();
    assert!(store.status().valid);
    assert!(store.has_finalizer());
}

#[tokio::test]
async fn test_auth_ref_and_vault_namespace_are_passed_to_factory() {
    let vault = FakeVault::new();
    let factory = FakeFactory::new(vault.clone());
    let store = FakeStore::new(vault_mount(
        "team-pki",
        json!({
            "type": "pki",
            "path": "pki",
            "vaultAuthRef": "ops",
            "namespace": "engineering"
        }),
    ));

    run_mount(&store, &factory).await.unwrap();

    assert_eq!(
        factory.requests(),
        vec![AuthRef {
            namespace: NAMESPACE.to_string(),
            name: "ops".to_string(),
            vault_namespace: Some("engineering".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_missing_manifest_is_a_no_op() {
    let vault = FakeVault::new();
    let factory = FakeFactory::new(vault.clone());
    let store = FakeStore::<VaultMount>::empty();

    let outcome = run_mount(&store, &factory).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Missing);
    assert!(factory.requests().is_empty());
    assert!(vault.calls().is_empty());
}

#[tokio::test]
async fn test_deletion_removes_mount_then_finalizer() {
    let (vault, factory, store) = setup("team-a/pki");
    run_mount(&store, &factory).await.unwrap();
    vault.clear_calls();

    store.request_deletion();
    let outcome = run_mount(&store, &factory).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Finalized);
    assert_eq!(
        vault.calls(),
        vec![VaultCall::Delete("sys/mounts/team-a/pki".to_string())]
    );
    assert!(!vault.has_mount("team-a/pki"));
    assert!(store.object().is_none());
}

#[tokio::test]
async fn test_failed_remote_delete_keeps_finalizer() {
    let (vault, factory, store) = setup("team-a/pki");
    run_mount(&store, &factory).await.unwrap();

    vault.fail_deletes_of("sys/mounts/team-a/pki");
    store.request_deletion();

    let err = run_mount(&store, &factory).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::Vault { operation: "delete", .. }));
    assert!(store.has_finalizer());
    assert!(vault.has_mount("team-a/pki"));
    assert_eq!(store.events().len(), 1);

    vault.allow_all_deletes();
    assert_eq!(
        run_mount(&store, &factory).await.unwrap(),
        ReconcileOutcome::Finalized
    );
    assert!(store.object().is_none());
}

#[tokio::test]
async fn test_deletion_during_pending_rename_removes_both_paths() {
    let (vault, factory, store) = setup("team-a/pki");
    run_mount(&store, &factory).await.unwrap();

    vault.fail_deletes_of("sys/mounts/team-a/pki");
    store.edit(|mount| mount.spec.settings.path = "team-a/pki-v2".to_string());
    run_mount(&store, &factory).await.unwrap_err();
    vault.allow_all_deletes();
    vault.clear_calls();

    store.request_deletion();
    assert_eq!(
        run_mount(&store, &factory).await.unwrap(),
        ReconcileOutcome::Finalized
    );

    assert_eq!(
        vault.calls(),
        vec![
            VaultCall::Delete("sys/mounts/team-a/pki-v2".to_string()),
            VaultCall::Delete("sys/mounts/team-a/pki".to_string()),
        ]
    );
    assert!(!vault.has_mount("team-a/pki"));
    assert!(!vault.has_mount("team-a/pki-v2"));
}

#[tokio::test]
async fn test_deleted_manifest_without_finalizer_is_left_alone() {
    let vault = FakeVault::new();
    let factory = FakeFactory::new(vault.clone());
    let mut mount = pki_mount("team-a/pki");
    mount.meta_mut().finalizers = Some(vec!["example.com/keep".to_string()]);
    mount.meta_mut().deletion_timestamp =
        Some(serde_json::from_value(json!("2026-01-01T00:00:00Z")).unwrap());
    let store = FakeStore::new(mount);

    let outcome = run_mount(&store, &factory).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Released);
    assert!(factory.requests().is_empty());
    assert!(vault.calls().is_empty());
    assert!(!store.has_finalizer());
}

#[tokio::test]
async fn test_foreign_finalizers_are_preserved() {
    let vault = FakeVault::new();
    let factory = FakeFactory::new(vault.clone());
    let mut mount = pki_mount("team-a/pki");
    mount.meta_mut().finalizers = Some(vec!["example.com/keep".to_string()]);
    let store = FakeStore::new(mount);

    run_mount(&store, &factory).await.unwrap();

    let finalizers = store.object().unwrap().meta().finalizers.clone().unwrap();
    assert_eq!(
        finalizers,
        vec![
            "example.com/keep".to_string(),
            VaultMount::FINALIZER.to_string()
        ]
    );
}

// ---------------------------------------------------------------------------
// VaultKVMount
// ---------------------------------------------------------------------------

fn kv_mount(version: Option<&str>) -> VaultKVMount {
    let mut spec = json!({
        "path": "team-a/secrets",
        "description": "Team A secrets",
        "options": {"custom": "yes"}
    });
    if let Some(version) = version {
        spec["version"] = json!(version);
    }
    vault_kv_mount("team-pki", spec)
}

#[tokio::test]
async fn test_kv_mount_defaults_to_version_2() {
    let vault = FakeVault::new();
    let factory = FakeFactory::new(vault.clone());
    let store = FakeStore::new(kv_mount(None));

    run::<MountStrategy<VaultKVMount>>(&store, &factory)
        .await
        .unwrap();

    let mutating = vault.mutating_calls();
    let VaultCall::Write(path, payload) = &mutating[0] else {
        panic!("expected a mount write, got {:?}", mutating[0]);
    };
    assert_eq!(path, "sys/mounts/team-a/secrets");
    assert_eq!(payload["type"], "kv");
    assert_eq!(payload["options"], json!({"custom": "yes", "version": "2"}));
    assert_eq!(store.status().identity, "team-a/secrets");
}

#[tokio::test]
async fn test_kv_version_overrides_user_options() {
    let vault = FakeVault::new();
    let factory = FakeFactory::new(vault.clone());
    let mut mount = kv_mount(Some("1"));
    mount
        .spec
        .settings
        .options
        .insert("version".to_string(), "2".to_string());
    let store = FakeStore::new(mount);

    run::<MountStrategy<VaultKVMount>>(&store, &factory)
        .await
        .unwrap();

    let options = vault.mount("team-a/secrets").unwrap().options.unwrap();
    assert_eq!(options.get("version").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn test_existing_kv_mount_is_tuned_with_version() {
    let vault = FakeVault::new();
    vault.seed_mount("team-a/secrets", "kv");
    let factory = FakeFactory::new(vault.clone());
    let store = FakeStore::new(kv_mount(Some("2")));

    run::<MountStrategy<VaultKVMount>>(&store, &factory)
        .await
        .unwrap();

    let mutating = vault.mutating_calls();
    assert_eq!(mutating.len(), 1);
    let VaultCall::TuneMount(path, config) = &mutating[0] else {
        panic!("expected a tune, got {:?}", mutating[0]);
    };
    assert_eq!(path, "team-a/secrets");
    assert_eq!(config.options.get("version").map(String::as_str), Some("2"));
    assert!(store.has_finalizer());
    assert_eq!(
        store.object().unwrap().finalizers().to_vec(),
        vec![VaultKVMount::FINALIZER.to_string()]
    );
}
