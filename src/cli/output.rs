//! Shared output formatting utilities for CLI commands
//!
//! Provides consistent output formatting across all CLI commands with support
//! for JSON and YAML, plus redacted views of stored state.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::resource::{CaState, RemoteCa, CURRENT_SCHEMA_VERSION};
use crate::secrets::SENSITIVE_PLACEHOLDER;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Print data in the specified OutputFormat
pub fn print_output<T: Serialize>(data: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(data),
        OutputFormat::Yaml => print_yaml(data),
    }
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data).context("Failed to serialize to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// State as shown to the user; key material is masked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateView {
    pub backend: String,
    pub schema_version: u64,
    pub key_mode: Option<&'static str>,
    pub generate_signing_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_key_name: Option<String>,
    pub key_type: String,
    pub key_bits: u64,
    pub public_key: Option<String>,
}

impl From<&CaState> for StateView {
    fn from(state: &CaState) -> Self {
        Self {
            backend: state.backend.to_string(),
            schema_version: CURRENT_SCHEMA_VERSION,
            key_mode: state.mode_selector(),
            generate_signing_key: state.generate_signing_key,
            private_key: state.private_key.as_ref().map(|_| SENSITIVE_PLACEHOLDER),
            managed_key_id: state.managed_key_id.clone(),
            managed_key_name: state.managed_key_name.clone(),
            key_type: state.key_type.clone(),
            key_bits: state.key_bits,
            public_key: state.public_key.clone(),
        }
    }
}

/// Result of reading a CA from the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadView {
    pub backend: String,
    pub present: bool,
    pub public_key: Option<String>,
}

impl ReadView {
    pub fn new(backend: &str, remote: Option<RemoteCa>) -> Self {
        Self {
            backend: backend.to_string(),
            present: remote.is_some(),
            public_key: remote.and_then(|remote| remote.public_key),
        }
    }
}
