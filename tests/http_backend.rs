//! HTTP facade behaviour against a mock Vault-compatible server

use serde_json::json;
use std::sync::Arc;
use vault_ssh_ca::backend::{LogicalBackend, Payload, VaultHttpBackend};
use vault_ssh_ca::resource::Action;
use vault_ssh_ca::secrets::SecretString;
use vault_ssh_ca::{CaConfigInput, CaError, ClientSettings, ErrorKind, MountPath, Reconciler};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CA_PATH: &str = "/v1/ssh-abc123/config/ca";

fn backend(server: &MockServer) -> VaultHttpBackend {
    let settings = ClientSettings {
        address: server.uri(),
        token: Some(SecretString::new("s.test-token")),
        namespace: Some("team-a".to_string()),
        timeout_seconds: 5,
        ..ClientSettings::default()
    };
    VaultHttpBackend::new(&settings).unwrap()
}

fn generate_payload() -> Payload {
    json!({"generate_signing_key": true, "key_type": "ssh-rsa", "key_bits": 0})
        .as_object()
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn test_read_sends_token_and_namespace() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CA_PATH))
        .and(header("X-Vault-Token", "s.test-token"))
        .and(header("X-Vault-Namespace", "team-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"public_key": "ssh-rsa AAAAB3NzaC1yc2E"},
            "warnings": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server).read("ssh-abc123/config/ca").await.unwrap().unwrap();
    assert_eq!(response.str_field("public_key"), Some("ssh-rsa AAAAB3NzaC1yc2E"));
    assert!(response.warnings.is_empty());
}

#[tokio::test]
async fn test_read_absent_on_404_and_204() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CA_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/ssh-empty/config/ca"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let backend = backend(&server);
    assert!(backend.read("ssh-abc123/config/ca").await.unwrap().is_none());
    assert!(backend.read("ssh-empty/config/ca").await.unwrap().is_none());
}

#[tokio::test]
async fn test_write_posts_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CA_PATH))
        .and(body_json(json!({"generate_signing_key": true, "key_type": "ssh-rsa", "key_bits": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"public_key": "ssh-rsa AAAA"},
            "warnings": ["key_bits defaulted"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server)
        .write("ssh-abc123/config/ca", &generate_payload())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.warnings, vec!["key_bits defaulted".to_string()]);
}

#[tokio::test]
async fn test_bad_request_is_backend_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CA_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": ["failed to parse private_key: no PEM block found"]
        })))
        .mount(&server)
        .await;

    let err = backend(&server)
        .write("ssh-abc123/config/ca", &generate_payload())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendRejection);
    assert!(err.to_string().contains("failed to parse private_key: no PEM block found"));
}

#[tokio::test]
async fn test_auth_and_server_errors_are_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CA_PATH))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"errors": ["permission denied"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(CA_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let backend = backend(&server);
    let err = backend.read("ssh-abc123/config/ca").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("permission denied"));

    let err = backend.delete("ssh-abc123/config/ca").await.unwrap_err();
    assert!(matches!(err, CaError::Transport { .. }));
}

#[tokio::test]
async fn test_delete_treats_404_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(CA_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server).delete("ssh-abc123/config/ca").await.unwrap();
}

#[tokio::test]
async fn test_unreachable_server_is_transport() {
    let settings = ClientSettings {
        address: "http://127.0.0.1:1".to_string(),
        timeout_seconds: 2,
        ..ClientSettings::default()
    };
    let backend = VaultHttpBackend::new(&settings).unwrap();

    let err = backend.read("ssh/config/ca").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_reconciler_create_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"public_key": "ssh-rsa AAAAB3NzaC1yc2E generated"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"public_key": "ssh-rsa AAAAB3NzaC1yc2E generated"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = Reconciler::new(Arc::new(backend(&server)));
    let input = CaConfigInput {
        backend: "ssh-abc123".to_string(),
        generate_signing_key: true,
        ..CaConfigInput::default()
    };

    let outcome = reconciler.apply(&input, None).await.unwrap();
    assert_eq!(outcome.plan.action, Action::Create);
    assert_eq!(outcome.state.backend, MountPath::new("ssh-abc123").unwrap());
    assert_eq!(outcome.state.public_key.as_deref(), Some("ssh-rsa AAAAB3NzaC1yc2E generated"));
}
