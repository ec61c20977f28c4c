//! Destroy verification.
//!
//! Confirms that a deleted CA is really gone. A CA that is still reported is a
//! [`CaError::StillPresent`] drift error, kept apart from transport failures
//! raised while checking.

use tracing::{debug, warn};

use super::model::MountPath;
use crate::backend::LogicalBackend;
use crate::errors::{CaError, Result};

/// Fail with a drift error if the backend still reports a CA at `mount`
pub async fn verify_destroyed(backend: &dyn LogicalBackend, mount: &MountPath) -> Result<()> {
    match backend.read(&mount.ca_config_path()).await? {
        None => {
            debug!(backend = %mount, "CA confirmed absent");
            Ok(())
        }
        Some(_) => {
            warn!(backend = %mount, "CA still present after delete");
            Err(CaError::still_present(mount))
        }
    }
}

/// Verify every mount in order, stopping at the first failure
pub async fn verify_all<'a, I>(backend: &dyn LogicalBackend, mounts: I) -> Result<()>
where
    I: IntoIterator<Item = &'a MountPath>,
{
    for mount in mounts {
        verify_destroyed(backend, mount).await?;
    }
    Ok(())
}
