//! # SSH CA Resource
//!
//! Schema, state migration and reconciliation of the signing CA of an SSH
//! secrets engine mount.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vault_ssh_ca::backend::InMemoryBackend;
//! use vault_ssh_ca::resource::{CaConfigInput, Reconciler};
//!
//! # async fn example() -> vault_ssh_ca::Result<()> {
//! let reconciler = Reconciler::new(Arc::new(InMemoryBackend::new().with_mount("ssh")));
//! let input = CaConfigInput {
//!     backend: "ssh".to_string(),
//!     generate_signing_key: true,
//!     ..CaConfigInput::default()
//! };
//! let outcome = reconciler.apply(&input, None).await?;
//! println!("{}", outcome.plan);
//! # Ok(())
//! # }
//! ```

pub mod import;
pub mod model;
pub mod plan;
pub mod reconciler;
pub mod schema;
pub mod upgrade;
pub mod verify;

pub use import::import_state;
pub use model::{
    CaConfigInput, CaState, DesiredCa, KeyMode, ManagedKeyRef, MountPath, StateRecord,
};
pub use plan::{Action, AttributeChange, Plan};
pub use reconciler::{read_remote, ApplyOutcome, Lifecycle, Reconciler, RemoteCa};
pub use schema::{CURRENT_SCHEMA_VERSION, LEGACY_KEY_TYPE};
pub use upgrade::{upgrade_record, upgrade_to_current, upgrade_v0_to_v1};
pub use verify::{verify_all, verify_destroyed};
