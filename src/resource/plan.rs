//! Per-resource plan: what applying a desired configuration would do.
//!
//! Every attribute of this resource is force-new, so any difference between
//! desired and prior state becomes a replacement. Computed attributes
//! (`public_key`) are never compared.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::model::{CaState, DesiredCa, KeyMode};
use super::schema::{attributes_for, Presence, CURRENT_SCHEMA_VERSION};
use crate::errors::Result;
use crate::secrets::SENSITIVE_PLACEHOLDER;

/// Action required to converge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Prior state already matches
    NoOp,
    /// No CA is configured yet
    Create,
    /// Delete the configured CA, then create it again
    Replace,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NoOp => write!(f, "no-op"),
            Action::Create => write!(f, "create"),
            Action::Replace => write!(f, "replace"),
        }
    }
}

/// One changed attribute, rendered for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeChange {
    pub attribute: &'static str,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// Planned action plus the attributes that drive it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub backend: String,
    pub action: Action,
    pub changes: Vec<AttributeChange>,
}

fn render(value: Option<&Value>, sensitive: bool) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(_) if sensitive => Some(SENSITIVE_PLACEHOLDER.to_string()),
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
    }
}

impl Plan {
    /// Compare desired configuration with prior state.
    ///
    /// `prior` is `None` when no state exists or the backend reports no CA.
    pub fn compute(desired: &DesiredCa, prior: Option<&CaState>) -> Result<Self> {
        let target = CaState::from_applied(desired, None).to_attributes()?;
        let before = match prior {
            Some(state) => Some(state.to_attributes()?),
            None => None,
        };
        let generated = matches!(desired.mode, KeyMode::Generated { .. });

        let mut changes = Vec::new();
        for attribute in attributes_for(CURRENT_SCHEMA_VERSION)? {
            if matches!(attribute.presence, Presence::Computed | Presence::OptionalComputed) {
                continue;
            }
            if !generated && matches!(attribute.name, "key_type" | "key_bits") {
                continue;
            }

            let after_value = target.get(attribute.name);
            let before_value = before.as_ref().and_then(|prior| prior.get(attribute.name));
            let unset = |value: Option<&Value>| match value {
                None | Some(Value::Null) | Some(Value::Bool(false)) => true,
                Some(Value::String(text)) => text.is_empty(),
                Some(_) => false,
            };
            if before_value == after_value || (unset(before_value) && unset(after_value)) {
                continue;
            }

            changes.push(AttributeChange {
                attribute: attribute.name,
                before: render(before_value, attribute.sensitive),
                after: render(after_value, attribute.sensitive),
            });
        }

        let action = match (prior, changes.is_empty()) {
            (None, _) => Action::Create,
            (Some(_), true) => Action::NoOp,
            (Some(_), false) => Action::Replace,
        };

        Ok(Self { backend: desired.backend.to_string(), action, changes })
    }

    /// True when nothing needs to change
    pub fn is_empty(&self) -> bool {
        self.action == Action::NoOp
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} CA for backend \"{}\"", self.action, self.backend)?;
        for change in &self.changes {
            writeln!(
                f,
                "  {}: {} -> {}",
                change.attribute,
                change.before.as_deref().unwrap_or("(unset)"),
                change.after.as_deref().unwrap_or("(unset)")
            )?;
        }
        Ok(())
    }
}
