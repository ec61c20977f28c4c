//! End-to-end reconciliation scenarios against the in-memory SSH engine

mod common;

use common::{generated, managed, provided, reconciler_with, PUBLIC_KEY};
use vault_ssh_ca::backend::{BackendCall, InMemoryBackend, LogicalBackend};
use vault_ssh_ca::resource::{verify_destroyed, Action, CaConfigInput};
use vault_ssh_ca::{CaError, ErrorKind, MountPath};

#[tokio::test]
async fn test_generated_key_lifecycle() {
    let (backend, reconciler) = reconciler_with(InMemoryBackend::new().with_mount("ssh-abc123"));
    let mount = MountPath::new("ssh-abc123").unwrap();

    let state = reconciler.create(&generated("ssh-abc123")).await.unwrap();
    assert_eq!(state.backend, mount);

    let remote = reconciler.read(&mount).await.unwrap().expect("CA should be present");
    let public_key = remote.public_key.expect("public key should be reported");
    assert!(public_key.starts_with("ssh-rsa "));
    assert_eq!(state.public_key.as_deref(), Some(public_key.as_str()));

    reconciler.destroy(&mount).await.unwrap();
    assert!(reconciler.read(&mount).await.unwrap().is_none());
    assert!(backend.public_key("ssh-abc123").is_none());
}

#[tokio::test]
async fn test_provided_key_lifecycle() {
    let (_, reconciler) = reconciler_with(InMemoryBackend::new().with_mount("ssh-xyz"));
    let mount = MountPath::new("ssh-xyz").unwrap();

    let state = reconciler.create(&provided("ssh-xyz")).await.unwrap();
    assert_eq!(state.public_key.as_deref(), Some(PUBLIC_KEY));
    assert!(state.private_key.is_some());

    let remote = reconciler.read(&mount).await.unwrap().unwrap();
    assert_eq!(remote.public_key.as_deref(), Some(PUBLIC_KEY));

    reconciler.delete(&mount).await.unwrap();
    verify_destroyed(reconciler.backend(), &mount).await.unwrap();
}

#[tokio::test]
async fn test_managed_key_lifecycle() {
    let backend = InMemoryBackend::new()
        .with_mount("ssh-kms")
        .with_managed_key("0f6b3a8e-kms", "ssh-rsa AAAAB3NzaC1yc2EAAAADAQAB kms");
    let (_, reconciler) = reconciler_with(backend);

    let state = reconciler.create(&managed("ssh-kms", "0f6b3a8e-kms")).await.unwrap();
    assert_eq!(state.managed_key_id.as_deref(), Some("0f6b3a8e-kms"));
    assert_eq!(state.public_key.as_deref(), Some("ssh-rsa AAAAB3NzaC1yc2EAAAADAQAB kms"));
}

#[tokio::test]
async fn test_unknown_managed_key_is_rejected_by_backend() {
    let (_, reconciler) = reconciler_with(InMemoryBackend::new().with_mount("ssh"));

    let err = reconciler.create(&managed("ssh", "missing")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendRejection);
    assert!(err.to_string().contains("managed key \"missing\" not found"));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (_, reconciler) = reconciler_with(InMemoryBackend::new().with_mount("ssh"));
    let mount = MountPath::new("ssh").unwrap();

    reconciler.delete(&mount).await.unwrap();
    reconciler.delete(&mount).await.unwrap();
    reconciler.destroy(&mount).await.unwrap();
}

#[tokio::test]
async fn test_import_round_trip() {
    let (backend, reconciler) = reconciler_with(InMemoryBackend::new().with_mount("ssh-abc123"));
    let payload = serde_json::json!({"generate_signing_key": true});
    backend
        .write("ssh-abc123/config/ca", payload.as_object().unwrap())
        .await
        .unwrap();

    let mount = MountPath::new("ssh-abc123").unwrap();
    let direct = reconciler.read(&mount).await.unwrap().unwrap();
    let imported = reconciler.import("ssh-abc123").await.unwrap();

    assert_eq!(imported.backend, mount);
    assert_eq!(imported.public_key, direct.public_key);
    assert!(!imported.generate_signing_key);
    assert!(imported.private_key.is_none());
    assert!(imported.managed_key_id.is_none());
    assert!(imported.managed_key_name.is_none());

    let plan = reconciler.plan(&generated("ssh-abc123"), Some(&imported)).await.unwrap();
    assert_eq!(plan.action, Action::Replace);
}

#[tokio::test]
async fn test_mutual_exclusion_fails_before_any_call() {
    let (backend, reconciler) = reconciler_with(InMemoryBackend::new().with_mount("ssh"));
    let input = CaConfigInput {
        private_key: Some(common::PRIVATE_KEY_PEM.into()),
        ..generated("ssh")
    };

    let err = reconciler.create(&input).await.unwrap_err();
    assert!(matches!(
        err,
        CaError::ConflictingOptions { first: "generate_signing_key", second: "private_key" }
    ));
    assert!(err.to_string().contains("generate_signing_key"));
    assert!(err.to_string().contains("private_key"));

    assert!(reconciler.apply(&input, None).await.is_err());
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_pem_is_rejected_without_read() {
    let (backend, reconciler) = reconciler_with(InMemoryBackend::new().with_mount("ssh"));
    let input = CaConfigInput {
        backend: "ssh".to_string(),
        private_key: Some("not a pem block".into()),
        ..CaConfigInput::default()
    };

    let err = reconciler.create(&input).await.unwrap_err();
    match &err {
        CaError::BackendRejection { path, status, errors } => {
            assert_eq!(path, "ssh/config/ca");
            assert_eq!(*status, 400);
            assert_eq!(errors.as_slice(), ["failed to parse private_key: no PEM block found"]);
        }
        other => panic!("expected a backend rejection, got {:?}", other),
    }

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], BackendCall::Write { .. }));
}

#[tokio::test]
async fn test_surviving_ca_is_reported_as_drift() {
    let backend = InMemoryBackend::new().with_mount("ssh").with_ignored_deletes();
    let (_, reconciler) = reconciler_with(backend);
    let mount = MountPath::new("ssh").unwrap();
    reconciler.create(&generated("ssh")).await.unwrap();

    let err = reconciler.destroy(&mount).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Drift);
    assert_eq!(err.to_string(), "CA information still exists for backend \"ssh\"");
}

#[tokio::test]
async fn test_apply_converges_and_stays_converged() {
    let (backend, reconciler) = reconciler_with(InMemoryBackend::new().with_mount("ssh"));

    let first = reconciler.apply(&provided("ssh"), None).await.unwrap();
    assert_eq!(first.plan.action, Action::Create);

    let second = reconciler.apply(&provided("ssh"), Some(&first.state)).await.unwrap();
    assert!(second.plan.is_empty());

    let switched = reconciler.apply(&generated("ssh"), Some(&second.state)).await.unwrap();
    assert_eq!(switched.plan.action, Action::Replace);
    assert!(switched.state.generate_signing_key);
    assert!(switched.state.private_key.is_none());
    assert_ne!(backend.public_key("ssh").as_deref(), Some(PUBLIC_KEY));
}
