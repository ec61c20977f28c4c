//! # State Upgrader
//!
//! Pure, local migration of persisted attribute maps between schema versions.
//!
//! Each step is registered under the version it upgrades from and steps are
//! chained until the record reaches [`CURRENT_SCHEMA_VERSION`]. A step checks
//! only the structural shape of its input; it never contacts the backend.

use serde_json::Value;
use tracing::debug;

use super::model::StateRecord;
use super::schema::{attributes_for, CURRENT_SCHEMA_VERSION, DEFAULT_KEY_BITS, LEGACY_KEY_TYPE};
use crate::backend::Payload;
use crate::errors::{CaError, Result};

type Upgrader = fn(Payload) -> Result<Payload>;

/// Upgrade steps keyed by the version they upgrade from
const UPGRADERS: &[(u64, Upgrader)] = &[(0, upgrade_v0_to_v1)];

/// Check that `attributes` has the shape of schema `version`
fn check_shape(version: u64, attributes: &Payload) -> Result<()> {
    let known = attributes_for(version)?;

    for (name, value) in attributes {
        if name == "id" {
            if !value.is_string() && !value.is_null() {
                return Err(CaError::state_shape(version, "'id' must be a string"));
            }
            continue;
        }
        let attribute = known.iter().find(|attribute| attribute.name == name).ok_or_else(|| {
            CaError::state_shape(version, format!("unexpected attribute '{}'", name))
        })?;
        if !attribute.accepts(value) {
            return Err(CaError::state_shape(
                version,
                format!("attribute '{}' has the wrong type", name),
            ));
        }
    }

    match attributes.get("backend") {
        Some(Value::String(backend)) if !backend.trim_matches('/').is_empty() => Ok(()),
        Some(_) => Err(CaError::state_shape(version, "'backend' must be a non-empty string")),
        None => Err(CaError::state_shape(version, "missing required attribute 'backend'")),
    }
}

/// Add `key_type` and `key_bits` with the values the backend used before they existed.
///
/// Null and empty-string attributes are dropped; version 0 stored unset
/// optional strings as `""`.
pub fn upgrade_v0_to_v1(mut attributes: Payload) -> Result<Payload> {
    check_shape(0, &attributes)?;

    attributes.remove("id");
    attributes.retain(|_, value| !value.is_null() && value.as_str() != Some(""));
    attributes.insert("key_type".to_string(), Value::String(LEGACY_KEY_TYPE.to_string()));
    attributes.insert("key_bits".to_string(), Value::from(DEFAULT_KEY_BITS));
    Ok(attributes)
}

/// Apply every upgrade step from `version` up to the current version
pub fn upgrade_to_current(version: u64, mut attributes: Payload) -> Result<Payload> {
    if version > CURRENT_SCHEMA_VERSION {
        return Err(CaError::UnsupportedSchemaVersion {
            found: version,
            current: CURRENT_SCHEMA_VERSION,
        });
    }

    for from in version..CURRENT_SCHEMA_VERSION {
        let (_, upgrader) =
            UPGRADERS.iter().find(|(step, _)| *step == from).ok_or_else(|| {
                CaError::state_shape(from, "no upgrade registered for this version")
            })?;
        attributes = upgrader(attributes)?;
        debug!(from_version = from, to_version = from + 1, "Upgraded state attributes");
    }

    Ok(attributes)
}

/// Upgrade a whole envelope.
///
/// Returns the record unchanged with `false` when it is already current.
pub fn upgrade_record(mut record: StateRecord) -> Result<(StateRecord, bool)> {
    if record.schema_version == CURRENT_SCHEMA_VERSION {
        return Ok((record, false));
    }

    if record.id.is_empty() {
        record.id = ["id", "backend"]
            .iter()
            .find_map(|key| record.attributes.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .trim_matches('/')
            .to_string();
    }

    let attributes = std::mem::take(&mut record.attributes);
    record.attributes = upgrade_to_current(record.schema_version, attributes)?;
    record.schema_version = CURRENT_SCHEMA_VERSION;
    Ok((record, true))
}
