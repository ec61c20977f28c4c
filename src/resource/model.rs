//! # Resource Model
//!
//! Desired configuration, typed state and the persisted state envelope of an
//! SSH CA configuration.
//!
//! Callers describe the CA with a flat [`CaConfigInput`] (the shape of a TOML
//! or JSON document). [`CaConfigInput::validate`] turns it into a
//! [`DesiredCa`] whose [`KeyMode`] holds exactly one key source, so two
//! selected modes cannot be represented past validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::schema::{self, CURRENT_SCHEMA_VERSION, DEFAULT_KEY_BITS, LEGACY_KEY_TYPE};
use crate::backend::Payload;
use crate::errors::{CaError, Result};
use crate::secrets::{SecretString, SENSITIVE_PLACEHOLDER};

/// Path of an SSH secrets engine mount, without leading or trailing `/`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MountPath(String);

impl MountPath {
    /// Normalise and validate a mount path
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim_matches('/');
        if trimmed.is_empty() {
            return Err(CaError::invalid_field("backend", "mount path must not be empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(CaError::invalid_field(
                "backend",
                "mount path must not contain whitespace",
            ));
        }
        if trimmed.split('/').any(str::is_empty) {
            return Err(CaError::invalid_field("backend", "mount path has an empty segment"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Logical path of the mount's CA configuration
    pub fn ca_config_path(&self) -> String {
        format!("{}/config/ca", self.0)
    }
}

impl fmt::Display for MountPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MountPath {
    type Err = CaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for MountPath {
    type Error = CaError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<MountPath> for String {
    fn from(path: MountPath) -> Self {
        path.0
    }
}

impl AsRef<str> for MountPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reference to an externally managed key, consumed verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedKeyRef {
    Id(String),
    Name(String),
}

impl ManagedKeyRef {
    /// Payload field carrying this reference
    pub fn field(&self) -> &'static str {
        match self {
            ManagedKeyRef::Id(_) => "managed_key_id",
            ManagedKeyRef::Name(_) => "managed_key_name",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ManagedKeyRef::Id(value) | ManagedKeyRef::Name(value) => value,
        }
    }
}

/// Source of the CA signing key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMode {
    /// The backend generates the key
    Generated { key_type: String, key_bits: u64 },
    /// The caller uploads the key pair
    Provided { private_key: SecretString, public_key: Option<String> },
    /// An external key manager holds the key
    Managed(ManagedKeyRef),
}

impl KeyMode {
    pub fn label(&self) -> &'static str {
        match self {
            KeyMode::Generated { .. } => "generated",
            KeyMode::Provided { .. } => "provided",
            KeyMode::Managed(_) => "managed",
        }
    }
}

/// Caller-facing CA configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaConfigInput {
    /// Mount path of the SSH secrets engine
    pub backend: String,

    #[serde(default)]
    pub generate_signing_key: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<SecretString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_key_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_bits: Option<u64>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

impl CaConfigInput {
    /// Check mutual exclusion and build the desired configuration.
    ///
    /// Empty strings count as unset. Runs entirely locally.
    pub fn validate(&self) -> Result<DesiredCa> {
        let backend = MountPath::new(&self.backend)?;
        let private_key = self.private_key.as_ref().filter(|key| !key.is_empty());
        let public_key = non_empty(&self.public_key);
        let managed_key_id = non_empty(&self.managed_key_id);
        let managed_key_name = non_empty(&self.managed_key_name);

        let mut selected = Vec::new();
        if self.generate_signing_key {
            selected.push("generate_signing_key");
        }
        if private_key.is_some() {
            selected.push("private_key");
        }
        if managed_key_id.is_some() {
            selected.push("managed_key_id");
        }
        if managed_key_name.is_some() {
            selected.push("managed_key_name");
        }

        if let &[first, second, ..] = selected.as_slice() {
            return Err(CaError::conflicting(first, second));
        }
        let Some(&selector) = selected.first() else {
            if public_key.is_some() {
                return Err(CaError::invalid_field("public_key", "requires private_key"));
            }
            return Err(CaError::MissingKeyMode);
        };

        if public_key.is_some() && selector != "private_key" {
            return Err(CaError::conflicting(selector, "public_key"));
        }
        if selector != "generate_signing_key" {
            if non_empty(&self.key_type).is_some() {
                return Err(CaError::invalid_field(
                    "key_type",
                    "only applies when generate_signing_key is true",
                ));
            }
            if self.key_bits.is_some() {
                return Err(CaError::invalid_field(
                    "key_bits",
                    "only applies when generate_signing_key is true",
                ));
            }
        }

        let mode = match (private_key, managed_key_id, managed_key_name) {
            (Some(private_key), _, _) => KeyMode::Provided {
                private_key: private_key.clone(),
                public_key: public_key.map(str::to_string),
            },
            (None, Some(id), _) => KeyMode::Managed(ManagedKeyRef::Id(id.to_string())),
            (None, None, Some(name)) => KeyMode::Managed(ManagedKeyRef::Name(name.to_string())),
            (None, None, None) => KeyMode::Generated {
                key_type: non_empty(&self.key_type).unwrap_or(LEGACY_KEY_TYPE).to_string(),
                key_bits: self.key_bits.unwrap_or(DEFAULT_KEY_BITS),
            },
        };

        Ok(DesiredCa { backend, mode })
    }
}

/// Validated desired configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredCa {
    pub backend: MountPath,
    pub mode: KeyMode,
}

impl DesiredCa {
    /// Request body for a write to the CA path
    pub fn write_payload(&self) -> Payload {
        let mut payload = Payload::new();
        match &self.mode {
            KeyMode::Generated { key_type, key_bits } => {
                payload.insert("generate_signing_key".to_string(), Value::Bool(true));
                payload.insert("key_type".to_string(), Value::String(key_type.clone()));
                payload.insert("key_bits".to_string(), Value::from(*key_bits));
            }
            KeyMode::Provided { private_key, public_key } => {
                payload.insert(
                    "private_key".to_string(),
                    Value::String(private_key.expose_secret().to_string()),
                );
                if let Some(public_key) = public_key {
                    payload.insert("public_key".to_string(), Value::String(public_key.clone()));
                }
            }
            KeyMode::Managed(reference) => {
                payload.insert(
                    reference.field().to_string(),
                    Value::String(reference.value().to_string()),
                );
            }
        }
        payload
    }

    /// Key type recorded in state; the legacy default outside generated mode
    pub fn key_type(&self) -> &str {
        match &self.mode {
            KeyMode::Generated { key_type, .. } => key_type,
            _ => LEGACY_KEY_TYPE,
        }
    }

    pub fn key_bits(&self) -> u64 {
        match &self.mode {
            KeyMode::Generated { key_bits, .. } => *key_bits,
            _ => DEFAULT_KEY_BITS,
        }
    }
}

fn default_key_type() -> String {
    LEGACY_KEY_TYPE.to_string()
}

/// Stored state of one CA configuration.
///
/// Write-only attributes hold their last-applied local values; `public_key`
/// is whatever the backend last reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaState {
    pub backend: MountPath,

    #[serde(default)]
    pub generate_signing_key: bool,

    #[serde(
        default,
        with = "crate::secrets::types::exposed",
        skip_serializing_if = "Option::is_none"
    )]
    pub private_key: Option<SecretString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_key_name: Option<String>,

    #[serde(default = "default_key_type")]
    pub key_type: String,

    #[serde(default)]
    pub key_bits: u64,
}

impl CaState {
    /// State after applying `desired`, with the public key read back from the backend
    pub fn from_applied(desired: &DesiredCa, public_key: Option<String>) -> Self {
        let mut state = Self::unresolved(desired.backend.clone());
        state.public_key = public_key;
        state.key_type = desired.key_type().to_string();
        state.key_bits = desired.key_bits();
        match &desired.mode {
            KeyMode::Generated { .. } => state.generate_signing_key = true,
            KeyMode::Provided { private_key, .. } => state.private_key = Some(private_key.clone()),
            KeyMode::Managed(ManagedKeyRef::Id(id)) => state.managed_key_id = Some(id.clone()),
            KeyMode::Managed(ManagedKeyRef::Name(name)) => {
                state.managed_key_name = Some(name.clone())
            }
        }
        state
    }

    /// State carrying only the mount, every other attribute unset or default
    pub fn unresolved(backend: MountPath) -> Self {
        Self {
            backend,
            generate_signing_key: false,
            private_key: None,
            public_key: None,
            managed_key_id: None,
            managed_key_name: None,
            key_type: default_key_type(),
            key_bits: DEFAULT_KEY_BITS,
        }
    }

    /// Selected key mode selector, if any
    pub fn mode_selector(&self) -> Option<&'static str> {
        if self.generate_signing_key {
            Some("generate_signing_key")
        } else if self.private_key.is_some() {
            Some("private_key")
        } else if self.managed_key_id.is_some() {
            Some("managed_key_id")
        } else if self.managed_key_name.is_some() {
            Some("managed_key_name")
        } else {
            None
        }
    }

    /// Attribute map as persisted, key material included
    pub fn to_attributes(&self) -> Result<Payload> {
        match serde_json::to_value(self) {
            Ok(Value::Object(attributes)) => Ok(attributes),
            Ok(_) => Err(CaError::config("CA state did not serialize to an object")),
            Err(e) => Err(CaError::serialization("Failed to serialize CA state", e)),
        }
    }

    /// Rebuild state from a current-version attribute map
    pub fn from_attributes(attributes: Payload) -> Result<Self> {
        serde_json::from_value(Value::Object(attributes))
            .map_err(|e| CaError::serialization("Failed to parse CA state attributes", e))
    }
}

/// Versioned envelope persisted by the state store
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub schema_version: u64,

    /// Resource id, the mount path
    #[serde(default)]
    pub id: String,

    pub attributes: Payload,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StateRecord {
    /// Wrap typed state in a current-version envelope
    pub fn from_state(state: &CaState) -> Result<Self> {
        Ok(Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: state.backend.to_string(),
            attributes: state.to_attributes()?,
            updated_at: Some(Utc::now()),
        })
    }

    /// Typed state of a current-version envelope
    pub fn into_state(self) -> Result<CaState> {
        if self.schema_version != CURRENT_SCHEMA_VERSION {
            return Err(CaError::state_shape(
                self.schema_version,
                format!("record must be upgraded to version {} first", CURRENT_SCHEMA_VERSION),
            ));
        }
        CaState::from_attributes(self.attributes)
    }
}

impl fmt::Debug for StateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attributes: Payload = self
            .attributes
            .iter()
            .map(|(name, value)| {
                let sensitive = schema::attribute(name).is_some_and(|a| a.sensitive);
                let shown = if sensitive && !value.is_null() {
                    Value::String(SENSITIVE_PLACEHOLDER.to_string())
                } else {
                    value.clone()
                };
                (name.clone(), shown)
            })
            .collect();

        f.debug_struct("StateRecord")
            .field("schema_version", &self.schema_version)
            .field("id", &self.id)
            .field("attributes", &attributes)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}
