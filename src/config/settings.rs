//! # Configuration Settings
//!
//! Connection settings for the secrets backend and the location of the local
//! state directory.

use crate::errors::{CaError, Result};
use crate::secrets::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Default backend address used when nothing else is configured
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8200";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Default state directory, relative to the working directory
pub const DEFAULT_STATE_DIR: &str = ".vault-ssh-ca/state";

/// Backend client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientSettings {
    /// Backend server address (e.g., "https://vault.example.com:8200")
    #[validate(length(min = 1, message = "Backend address cannot be empty"))]
    pub address: String,

    /// Authentication token sent as `X-Vault-Token`
    #[serde(default)]
    pub token: Option<SecretString>,

    /// Namespace sent as `X-Vault-Namespace`
    #[serde(default)]
    pub namespace: Option<String>,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,

    /// Directory holding one state file per mount
    pub state_dir: PathBuf,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            token: None,
            namespace: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}

impl ClientSettings {
    /// Load settings from environment variables, falling back to defaults.
    ///
    /// - `VAULT_ADDR`: backend address
    /// - `VAULT_TOKEN`: authentication token
    /// - `VAULT_NAMESPACE`: optional namespace
    /// - `SSHCA_TIMEOUT`: request timeout in seconds
    /// - `SSHCA_STATE_DIR`: state directory
    pub fn from_env() -> Result<Self> {
        let settings = Self::default().with_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Replace every field whose environment variable is set and non-empty
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(address) = non_empty_env("VAULT_ADDR") {
            self.address = address;
        }
        if let Some(token) = non_empty_env("VAULT_TOKEN") {
            self.token = Some(SecretString::new(token));
        }
        if let Some(namespace) = non_empty_env("VAULT_NAMESPACE") {
            self.namespace = Some(namespace);
        }
        if let Some(raw) = non_empty_env("SSHCA_TIMEOUT") {
            self.timeout_seconds = raw
                .parse()
                .map_err(|e| CaError::config(format!("Invalid SSHCA_TIMEOUT '{}': {}", raw, e)))?;
        }
        if let Some(state_dir) = non_empty_env("SSHCA_STATE_DIR") {
            self.state_dir = PathBuf::from(state_dir);
        }
        Ok(self)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)?;

        let parsed = url::Url::parse(&self.address).map_err(|e| {
            CaError::config(format!("Backend address '{}' is not a valid URL: {}", self.address, e))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CaError::config(format!(
                "Backend address must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        Ok(())
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Serialises tests that touch process environment variables
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Environment variables read by [`ClientSettings::with_env_overrides`]
#[cfg(test)]
pub(crate) const ENV_VARS: [&str; 5] =
    ["VAULT_ADDR", "VAULT_TOKEN", "VAULT_NAMESPACE", "SSHCA_TIMEOUT", "SSHCA_STATE_DIR"];

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
