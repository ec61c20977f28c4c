//! # Reconciler
//!
//! CRUD state machine for the CA configuration at `<backend>/config/ca`.
//!
//! ```text
//! Absent -> Creating -> Present -> Updating -> Present -> Deleting -> Absent
//! ```
//!
//! Only `Present` and `Absent` are observable; the other states each span a
//! single backend call. Every operation awaits its calls in sequence and
//! nothing is retried here.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

use super::import::import_state;
use super::model::{CaConfigInput, CaState, DesiredCa, KeyMode, MountPath};
use super::plan::{Action, Plan};
use super::verify::verify_destroyed;
use crate::backend::LogicalBackend;
use crate::errors::{CaError, Result};

/// Lifecycle state of a CA configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Absent => "absent",
            Lifecycle::Creating => "creating",
            Lifecycle::Present => "present",
            Lifecycle::Updating => "updating",
            Lifecycle::Deleting => "deleting",
        };
        f.write_str(name)
    }
}

/// What the backend reports for a configured CA
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteCa {
    pub backend: MountPath,
    pub public_key: Option<String>,
}

/// Read the CA at `mount`; `None` when the backend reports nothing
pub async fn read_remote(
    backend: &dyn LogicalBackend,
    mount: &MountPath,
) -> Result<Option<RemoteCa>> {
    let response = backend.read(&mount.ca_config_path()).await?;
    Ok(response.map(|response| RemoteCa {
        backend: mount.clone(),
        public_key: response.str_field("public_key").map(str::to_string),
    }))
}

/// Result of [`Reconciler::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub plan: Plan,
    pub state: CaState,
}

/// Drives one CA configuration toward its desired state
#[derive(Debug, Clone)]
pub struct Reconciler {
    backend: Arc<dyn LogicalBackend>,
}

fn transition(mount: &MountPath, from: Lifecycle, to: Lifecycle) {
    debug!(backend = %mount, from = %from, to = %to, "CA lifecycle transition");
}

impl Reconciler {
    pub fn new(backend: Arc<dyn LogicalBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn LogicalBackend {
        self.backend.as_ref()
    }

    /// Validate `input` and configure the CA
    pub async fn create(&self, input: &CaConfigInput) -> Result<CaState> {
        let desired = input.validate()?;
        self.write_config(&desired, Lifecycle::Absent).await
    }

    /// Validate `input` and overwrite the CA in place.
    ///
    /// Backends that refuse to reconfigure existing keys reject this; use
    /// [`Reconciler::apply`], which replaces instead.
    pub async fn update(&self, input: &CaConfigInput) -> Result<CaState> {
        let desired = input.validate()?;
        self.write_config(&desired, Lifecycle::Present).await
    }

    /// Write the desired configuration, then read back the public key.
    ///
    /// No read is attempted when the write fails.
    pub async fn write_config(&self, desired: &DesiredCa, from: Lifecycle) -> Result<CaState> {
        let operation = if from == Lifecycle::Absent { "create" } else { "update" };
        let span = crate::resource_span!(operation, desired.backend, mode = desired.mode.label());

        async {
            let mount = &desired.backend;
            let transient =
                if from == Lifecycle::Absent { Lifecycle::Creating } else { Lifecycle::Updating };
            transition(mount, from, transient);

            match &desired.mode {
                KeyMode::Generated { key_type, key_bits } => {
                    info!(key_type = %key_type, key_bits, "Configuring CA with a generated key")
                }
                KeyMode::Provided { private_key, public_key } => info!(
                    key_fingerprint = %private_key.fingerprint(),
                    public_key_supplied = public_key.is_some(),
                    "Configuring CA with provided key material"
                ),
                KeyMode::Managed(reference) => info!(
                    reference_kind = reference.field(),
                    reference = %reference.value(),
                    "Configuring CA with a managed key"
                ),
            }

            let written =
                self.backend.write(&mount.ca_config_path(), &desired.write_payload()).await?;
            for warning in written.iter().flat_map(|response| &response.warnings) {
                warn!(warning = %warning, "Backend returned a warning");
            }
            transition(mount, transient, Lifecycle::Present);

            let remote = read_remote(self.backend(), mount)
                .await?
                .ok_or_else(|| CaError::not_found(mount))?;
            if remote.public_key.is_none() {
                warn!("Backend reported the CA without a public key");
            }

            Ok(CaState::from_applied(desired, remote.public_key))
        }
        .instrument(span)
        .await
    }

    /// Fetch what the backend reports for the CA at `mount`
    pub async fn read(&self, mount: &MountPath) -> Result<Option<RemoteCa>> {
        read_remote(self.backend(), mount).instrument(crate::resource_span!("read", mount)).await
    }

    /// Prior state with `public_key` refreshed; `None` when the CA is gone
    pub async fn refresh(&self, prior: &CaState) -> Result<Option<CaState>> {
        let remote = self.read(&prior.backend).await?;
        if remote.is_none() {
            info!(backend = %prior.backend, "CA no longer present, it will be recreated");
        }
        Ok(remote.map(|remote| CaState { public_key: remote.public_key, ..prior.clone() }))
    }

    /// Clear the CA at `mount`; succeeds when nothing is configured
    pub async fn delete(&self, mount: &MountPath) -> Result<()> {
        async {
            transition(mount, Lifecycle::Present, Lifecycle::Deleting);
            self.backend.delete(&mount.ca_config_path()).await?;
            transition(mount, Lifecycle::Deleting, Lifecycle::Absent);
            info!("CA configuration deleted");
            Ok(())
        }
        .instrument(crate::resource_span!("delete", mount))
        .await
    }

    /// Delete the CA and confirm the backend no longer reports it
    pub async fn destroy(&self, mount: &MountPath) -> Result<()> {
        self.delete(mount).await?;
        verify_destroyed(self.backend(), mount)
            .instrument(crate::resource_span!("verify_destroyed", mount))
            .await
    }

    /// Build state for an existing CA from its mount path alone
    pub async fn import(&self, id: &str) -> Result<CaState> {
        import_state(self.backend(), id).instrument(crate::resource_span!("import", id)).await
    }

    /// Validate `input`, refresh `prior` and compute the plan
    pub async fn plan(&self, input: &CaConfigInput, prior: Option<&CaState>) -> Result<Plan> {
        let desired = input.validate()?;
        let current = match prior {
            Some(prior) => self.refresh(prior).await?,
            None => None,
        };
        Plan::compute(&desired, current.as_ref())
    }

    /// Converge the backend on `input`.
    ///
    /// A replacement deletes the configured CA before writing, since the
    /// backend refuses to reconfigure existing keys.
    pub async fn apply(
        &self,
        input: &CaConfigInput,
        prior: Option<&CaState>,
    ) -> Result<ApplyOutcome> {
        let desired = input.validate()?;
        let current = match prior {
            Some(prior) => self.refresh(prior).await?,
            None => None,
        };
        let plan = Plan::compute(&desired, current.as_ref())?;
        info!(
            backend = %desired.backend,
            action = %plan.action,
            changes = plan.changes.len(),
            "Planned CA changes"
        );

        let state = match (plan.action, current) {
            (Action::NoOp, Some(current)) => current,
            (Action::Replace, Some(current)) => {
                self.delete(&current.backend).await?;
                self.write_config(&desired, Lifecycle::Absent).await?
            }
            _ => self.write_config(&desired, Lifecycle::Absent).await?,
        };

        Ok(ApplyOutcome { plan, state })
    }
}
