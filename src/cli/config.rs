//! Configuration file handling for the vault-ssh-ca CLI
//!
//! Loads defaults from ~/.vault-ssh-ca/config.toml and resolves the effective
//! client settings from flags, environment and that file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::ClientSettings;
use crate::secrets::SecretString;

/// CLI configuration stored in ~/.vault-ssh-ca/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Backend address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Backend token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<SecretString>,

    /// Backend namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Request timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Directory holding state files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

impl CliConfig {
    /// Get the default configuration file path (~/.vault-ssh-ca/config.toml)
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Unable to determine home directory")?;

        let mut path = PathBuf::from(home);
        path.push(".vault-ssh-ca");
        path.push("config.toml");

        Ok(path)
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_path()?)
    }

    /// Load configuration from a specific path; a missing file yields defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Copy every value present in the file onto `settings`
    fn apply_to(self, settings: &mut ClientSettings) {
        if let Some(address) = self.address.filter(|a| !a.is_empty()) {
            settings.address = address;
        }
        if let Some(token) = self.token.filter(|t| !t.is_empty()) {
            settings.token = Some(token);
        }
        if let Some(namespace) = self.namespace.filter(|n| !n.is_empty()) {
            settings.namespace = Some(namespace);
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_seconds = timeout;
        }
        if let Some(state_dir) = self.state_dir {
            settings.state_dir = state_dir;
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub address: Option<String>,
    pub token: Option<SecretString>,
    pub namespace: Option<String>,
    pub timeout: Option<u64>,
    pub state_dir: Option<PathBuf>,
}

/// Resolve the effective client settings
///
/// Later sources win:
/// 1. Built-in defaults
/// 2. The config file
/// 3. VAULT_ADDR, VAULT_TOKEN, VAULT_NAMESPACE, SSHCA_TIMEOUT, SSHCA_STATE_DIR
/// 4. Command line flags
pub fn resolve_settings(
    overrides: SettingsOverrides,
    config_file: Option<&Path>,
) -> Result<ClientSettings> {
    let file = match config_file {
        Some(path) => CliConfig::load_from_path(path)?,
        None => CliConfig::load().unwrap_or_default(),
    };

    let mut settings = ClientSettings::default();
    file.apply_to(&mut settings);
    let mut settings = settings.with_env_overrides()?;

    if let Some(address) = overrides.address {
        debug!("Using backend address from --address flag");
        settings.address = address;
    }
    if let Some(token) = overrides.token {
        debug!("Using token from --token flag");
        settings.token = Some(token);
    }
    if let Some(namespace) = overrides.namespace {
        settings.namespace = Some(namespace);
    }
    if let Some(timeout) = overrides.timeout {
        settings.timeout_seconds = timeout;
    }
    if let Some(state_dir) = overrides.state_dir {
        settings.state_dir = state_dir;
    }

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{ENV_MUTEX, ENV_VARS};
    use tempfile::TempDir;

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_config_deserialization() {
        let config: CliConfig = toml::from_str(
            r#"
            address = "https://vault.example.com:8200"
            token = "s.file-token"
            timeout = 60
            state_dir = "/var/lib/sshca"
        "#,
        )
        .unwrap();

        assert_eq!(config.address.as_deref(), Some("https://vault.example.com:8200"));
        assert_eq!(config.token.as_ref().map(|t| t.expose_secret()), Some("s.file-token"));
        assert_eq!(config.timeout, Some(60));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = CliConfig::load_from_path(&temp_dir.path().join("config.toml")).unwrap();
        assert!(config.address.is_none());
        assert!(config.token.is_none());
    }

    #[test]
    fn test_precedence_flag_over_env_over_file() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "address = \"http://file:8200\"\nnamespace = \"file-ns\"\ntimeout = 10\n",
        )
        .unwrap();

        std::env::set_var("VAULT_ADDR", "http://env:8200");
        let settings = resolve_settings(
            SettingsOverrides { timeout: Some(20), ..SettingsOverrides::default() },
            Some(&path),
        )
        .unwrap();

        assert_eq!(settings.address, "http://env:8200");
        assert_eq!(settings.namespace.as_deref(), Some("file-ns"));
        assert_eq!(settings.timeout_seconds, 20);

        let settings = resolve_settings(
            SettingsOverrides {
                address: Some("http://flag:8200".to_string()),
                ..SettingsOverrides::default()
            },
            Some(&path),
        )
        .unwrap();
        assert_eq!(settings.address, "http://flag:8200");

        clear_env();
    }

    #[test]
    fn test_invalid_resolved_settings_fail() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let temp_dir = TempDir::new().unwrap();
        let result = resolve_settings(
            SettingsOverrides { timeout: Some(0), ..SettingsOverrides::default() },
            Some(&temp_dir.path().join("absent.toml")),
        );
        assert!(result.is_err());
    }
}
