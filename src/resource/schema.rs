//! Versioned attribute schema of the SSH CA configuration resource.
//!
//! Every attribute is tagged with the first schema version that carries it.
//! The upgrader validates stored records against the attribute set of their
//! declared version. The plan reads `presence` and `sensitive`; `write_only`,
//! `force_new` and `conflicts_with` describe the backend contract published by
//! the `schema` command, and the mode selectors are checked against
//! `conflicts_with` in tests.

use serde::Serialize;
use serde_json::Value;

use crate::errors::{CaError, Result};

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: u64 = 1;

/// Key type the backend used for configurations created before `key_type` existed
pub const LEGACY_KEY_TYPE: &str = "ssh-rsa";

/// Key size meaning "backend default for the key type"
pub const DEFAULT_KEY_BITS: u64 = 0;

/// Attributes selecting the key mode; at most one may be set
pub const MODE_SELECTORS: [&str; 4] =
    ["generate_signing_key", "private_key", "managed_key_id", "managed_key_name"];

/// Value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Bool,
    Int,
}

/// Who supplies an attribute's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Always supplied by the caller
    Required,
    /// May be supplied by the caller
    Optional,
    /// Only ever reported by the backend
    Computed,
    /// Supplied by the caller or filled from the backend
    OptionalComputed,
}

/// Descriptor of one resource attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: AttributeType,
    pub presence: Presence,
    /// Never logged or shown in plan output
    pub sensitive: bool,
    /// Accepted on write but never reported on read
    pub write_only: bool,
    /// Any change requires deleting and re-creating the CA
    pub force_new: bool,
    pub conflicts_with: &'static [&'static str],
    /// First schema version carrying the attribute
    pub since: u64,
    pub description: &'static str,
}

impl Attribute {
    /// Whether `value` is acceptable for this attribute in stored state
    pub fn accepts(&self, value: &Value) -> bool {
        match (self.ty, value) {
            (_, Value::Null) => self.presence != Presence::Required,
            (AttributeType::String, Value::String(_)) => true,
            (AttributeType::Bool, Value::Bool(_)) => true,
            (AttributeType::Int, Value::Number(number)) => number.is_u64(),
            _ => false,
        }
    }
}

const ATTRIBUTES: &[Attribute] = &[
    Attribute {
        name: "backend",
        ty: AttributeType::String,
        presence: Presence::Required,
        sensitive: false,
        write_only: false,
        force_new: true,
        conflicts_with: &[],
        since: 0,
        description: "Path of the SSH secrets engine mount",
    },
    Attribute {
        name: "generate_signing_key",
        ty: AttributeType::Bool,
        presence: Presence::Optional,
        sensitive: false,
        write_only: true,
        force_new: true,
        conflicts_with: &["private_key", "managed_key_id", "managed_key_name"],
        since: 0,
        description: "Generate the signing key inside the backend",
    },
    Attribute {
        name: "private_key",
        ty: AttributeType::String,
        presence: Presence::Optional,
        sensitive: true,
        write_only: true,
        force_new: true,
        conflicts_with: &["generate_signing_key", "managed_key_id", "managed_key_name"],
        since: 0,
        description: "PEM encoded private key of the CA",
    },
    Attribute {
        name: "public_key",
        ty: AttributeType::String,
        presence: Presence::OptionalComputed,
        sensitive: false,
        write_only: false,
        force_new: true,
        conflicts_with: &[],
        since: 0,
        description: "OpenSSH public key of the CA, reported by the backend",
    },
    Attribute {
        name: "managed_key_id",
        ty: AttributeType::String,
        presence: Presence::Optional,
        sensitive: false,
        write_only: true,
        force_new: true,
        conflicts_with: &["generate_signing_key", "private_key", "managed_key_name"],
        since: 0,
        description: "Id of an externally managed key",
    },
    Attribute {
        name: "managed_key_name",
        ty: AttributeType::String,
        presence: Presence::Optional,
        sensitive: false,
        write_only: true,
        force_new: true,
        conflicts_with: &["generate_signing_key", "private_key", "managed_key_id"],
        since: 0,
        description: "Name of an externally managed key",
    },
    Attribute {
        name: "key_type",
        ty: AttributeType::String,
        presence: Presence::Optional,
        sensitive: false,
        write_only: true,
        force_new: true,
        conflicts_with: &[],
        since: 1,
        description: "Algorithm of a generated signing key",
    },
    Attribute {
        name: "key_bits",
        ty: AttributeType::Int,
        presence: Presence::Optional,
        sensitive: false,
        write_only: true,
        force_new: true,
        conflicts_with: &[],
        since: 1,
        description: "Size of a generated signing key, 0 for the key type's default",
    },
];

/// Attribute set of a schema version
pub fn attributes_for(version: u64) -> Result<Vec<&'static Attribute>> {
    if version > CURRENT_SCHEMA_VERSION {
        return Err(CaError::UnsupportedSchemaVersion {
            found: version,
            current: CURRENT_SCHEMA_VERSION,
        });
    }
    Ok(ATTRIBUTES.iter().filter(|attribute| attribute.since <= version).collect())
}

/// Current descriptor of an attribute by name
pub fn attribute(name: &str) -> Option<&'static Attribute> {
    ATTRIBUTES.iter().find(|attribute| attribute.name == name)
}
