//! In-memory simulation of an SSH secrets engine's `config/ca` endpoint.
//!
//! Follows the server's observable rules closely enough to exercise the
//! reconciler without a live backend:
//!
//! - writes to an unknown mount are rejected with 404
//! - writing while a CA is already configured is rejected
//! - generated keys produce a public key in OpenSSH format
//! - provided key material must look like a PEM private key
//! - managed keys must be registered up front
//! - private keys are never echoed back; reads return `public_key` only
//!
//! Every call is recorded (path and payload field names, never values) so
//! tests can assert that nothing reached the backend.

use async_trait::async_trait;
use base64::Engine;
use rand::RngCore;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{LogicalBackend, LogicalResponse, Payload};
use crate::errors::{CaError, Result};

const CA_SUFFIX: &str = "/config/ca";

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Read { path: String },
    Write { path: String, fields: Vec<String> },
    Delete { path: String },
}

#[derive(Debug, Default)]
struct State {
    mounts: HashSet<String>,
    ca: HashMap<String, String>,
    managed_keys: HashMap<String, String>,
    calls: Vec<BackendCall>,
    ignore_deletes: bool,
}

/// In-memory SSH secrets engine
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    /// Create an empty backend with no mounts
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an SSH mount
    pub fn with_mount(self, mount: impl Into<String>) -> Self {
        self.lock().mounts.insert(mount.into().trim_matches('/').to_string());
        self
    }

    /// Register a managed key reachable by id or name, with its public half
    pub fn with_managed_key(
        self,
        reference: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        self.lock().managed_keys.insert(reference.into(), public_key.into());
        self
    }

    /// Acknowledge deletes without removing anything
    pub fn with_ignored_deletes(self) -> Self {
        self.lock().ignore_deletes = true;
        self
    }

    /// Recorded calls, oldest first
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Public key currently configured at a mount
    pub fn public_key(&self, mount: &str) -> Option<String> {
        self.lock().ca.get(mount.trim_matches('/')).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked mid-call.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn mount_of(path: &str) -> Option<&str> {
    path.trim_matches('/').strip_suffix(CA_SUFFIX).filter(|mount| !mount.is_empty())
}

fn bad_request(path: &str, message: impl Into<String>) -> CaError {
    CaError::rejected(path, 400, vec![message.into()])
}

fn no_handler(path: &str) -> CaError {
    CaError::rejected(path, 404, vec![format!("no handler for route \"{}\"", path)])
}

fn str_param<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).filter(|value| !value.is_empty())
}

/// OpenSSH algorithm name for a requested key type and size
fn ssh_algorithm(key_type: &str, key_bits: u64) -> Option<&'static str> {
    match key_type {
        "ssh-rsa" | "rsa" => Some("ssh-rsa"),
        "ssh-ed25519" | "ed25519" => Some("ssh-ed25519"),
        "ec" | "ecdsa" | "ecdsa-sha2-nistp256" if key_bits == 0 || key_bits == 256 => {
            Some("ecdsa-sha2-nistp256")
        }
        "ec" | "ecdsa" | "ecdsa-sha2-nistp384" if key_bits == 0 || key_bits == 384 => {
            Some("ecdsa-sha2-nistp384")
        }
        "ec" | "ecdsa" | "ecdsa-sha2-nistp521" if key_bits == 0 || key_bits == 521 => {
            Some("ecdsa-sha2-nistp521")
        }
        _ => None,
    }
}

fn generated_public_key(algorithm: &str) -> String {
    let mut blob = [0u8; 48];
    rand::thread_rng().fill_bytes(&mut blob);
    format!("{} {}", algorithm, base64::engine::general_purpose::STANDARD.encode(blob))
}

fn derived_public_key(private_key: &str) -> String {
    let digest = Sha256::digest(private_key.as_bytes());
    format!("ssh-rsa {}", base64::engine::general_purpose::STANDARD.encode(digest))
}

fn public_key_response(public_key: String) -> LogicalResponse {
    let mut data = Payload::new();
    data.insert("public_key".to_string(), Value::String(public_key));
    LogicalResponse::with_data(data)
}

fn looks_like_private_key(pem: &str) -> bool {
    let pem = pem.trim();
    pem.starts_with("-----BEGIN ") && pem.contains("PRIVATE KEY-----") && pem.ends_with("-----")
}

fn looks_like_public_key(key: &str) -> bool {
    let mut parts = key.split_whitespace();
    matches!(
        (parts.next(), parts.next()),
        (Some(algorithm), Some(blob))
            if (algorithm.starts_with("ssh-") || algorithm.starts_with("ecdsa-"))
                && base64::engine::general_purpose::STANDARD.decode(blob).is_ok()
    )
}

impl State {
    fn configure(&mut self, path: &str, payload: &Payload) -> Result<Option<LogicalResponse>> {
        let mount = mount_of(path).ok_or_else(|| no_handler(path))?.to_string();
        if !self.mounts.contains(&mount) {
            return Err(no_handler(path));
        }
        if self.ca.contains_key(&mount) {
            return Err(bad_request(
                path,
                "keys are already configured; delete them before reconfiguring",
            ));
        }

        let generate =
            payload.get("generate_signing_key").and_then(Value::as_bool).unwrap_or(false);
        let private_key = str_param(payload, "private_key");
        let public_key = str_param(payload, "public_key");
        let managed = str_param(payload, "managed_key_id")
            .or_else(|| str_param(payload, "managed_key_name"));

        if generate && (private_key.is_some() || public_key.is_some() || managed.is_some()) {
            return Err(bad_request(
                path,
                "generate_signing_key cannot be combined with key material",
            ));
        }

        let (configured, echo) = if generate {
            let key_type = str_param(payload, "key_type").unwrap_or("ssh-rsa");
            let key_bits = payload.get("key_bits").and_then(Value::as_u64).unwrap_or(0);
            let algorithm = ssh_algorithm(key_type, key_bits).ok_or_else(|| {
                bad_request(
                    path,
                    format!("unknown key_type/key_bits combination: {}/{}", key_type, key_bits),
                )
            })?;
            let public = generated_public_key(algorithm);
            (public.clone(), Some(public))
        } else if let Some(reference) = managed {
            if private_key.is_some() {
                return Err(bad_request(path, "managed key and private_key are mutually exclusive"));
            }
            let public = self.managed_keys.get(reference).cloned().ok_or_else(|| {
                bad_request(path, format!("managed key \"{}\" not found", reference))
            })?;
            (public, None)
        } else if let Some(private_key) = private_key {
            if !looks_like_private_key(private_key) {
                return Err(bad_request(path, "failed to parse private_key: no PEM block found"));
            }
            match public_key {
                Some(public) if !looks_like_public_key(public) => {
                    return Err(bad_request(path, "failed to parse public_key"));
                }
                Some(public) => (public.to_string(), None),
                None => (derived_public_key(private_key), None),
            }
        } else if public_key.is_some() {
            return Err(bad_request(path, "missing private_key"));
        } else {
            return Err(bad_request(path, "missing public_key"));
        };

        self.ca.insert(mount, configured);
        Ok(echo.map(public_key_response))
    }
}

#[async_trait]
impl LogicalBackend for InMemoryBackend {
    async fn read(&self, path: &str) -> Result<Option<LogicalResponse>> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Read { path: path.to_string() });

        let public = mount_of(path).and_then(|mount| state.ca.get(mount)).cloned();
        Ok(public.map(public_key_response))
    }

    async fn write(&self, path: &str, payload: &Payload) -> Result<Option<LogicalResponse>> {
        let mut state = self.lock();
        let mut fields: Vec<String> = payload.keys().cloned().collect();
        fields.sort();
        state.calls.push(BackendCall::Write { path: path.to_string(), fields });

        state.configure(path, payload)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Delete { path: path.to_string() });

        if !state.ignore_deletes {
            if let Some(mount) = mount_of(path) {
                let mount = mount.to_string();
                state.ca.remove(&mount);
            }
        }
        Ok(())
    }
}
