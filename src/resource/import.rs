//! Import of an existing CA from its mount path.
//!
//! The backend never reports key material or the key mode selector, so an
//! imported state carries only `backend`, `public_key` and the schema
//! defaults. Applying a configuration on top of it plans a replacement.

use tracing::info;

use super::model::{CaState, MountPath};
use super::reconciler::read_remote;
use crate::backend::LogicalBackend;
use crate::errors::{CaError, Result};

/// Build state for the CA configured at mount `id`
pub async fn import_state(backend: &dyn LogicalBackend, id: &str) -> Result<CaState> {
    let mount = MountPath::new(id)?;
    let remote = read_remote(backend, &mount).await?.ok_or_else(|| CaError::not_found(&mount))?;

    info!(backend = %mount, "Imported CA configuration");
    Ok(CaState { public_key: remote.public_key, ..CaState::unresolved(mount) })
}
