//! # vault-ssh-ca
//!
//! Reconciles the signing CA of an SSH secrets engine mount in a
//! Vault-compatible secrets backend against a declared configuration.
//!
//! ## Architecture
//!
//! ```text
//! CaConfigInput → validate → Reconciler → LogicalBackend (HTTP or in-memory)
//!                                 ↓
//!                         FileStateStore ← State Upgrader
//! ```
//!
//! ## Core Components
//!
//! - **Attribute Schema**: versioned attribute descriptors ([`resource::schema`])
//! - **State Upgrader**: pure schema migration of stored state ([`resource::upgrade`])
//! - **Reconciler**: create/read/update/delete/import against `<mount>/config/ca`
//! - **Destroy Verifier**: confirms a deleted CA is gone ([`resource::verify`])
//! - **State Store**: one versioned JSON envelope per mount ([`state`])
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vault_ssh_ca::{CaConfigInput, ClientSettings, Reconciler, Result, VaultHttpBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let settings = ClientSettings::from_env()?;
//!     let reconciler = Reconciler::new(Arc::new(VaultHttpBackend::new(&settings)?));
//!
//!     let input = CaConfigInput {
//!         backend: "ssh-abc123".to_string(),
//!         generate_signing_key: true,
//!         ..CaConfigInput::default()
//!     };
//!     let outcome = reconciler.apply(&input, None).await?;
//!     println!("{:?}", outcome.state.public_key);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod resource;
pub mod secrets;
pub mod state;

// Re-export commonly used types and traits
pub use backend::{InMemoryBackend, LogicalBackend, VaultHttpBackend};
pub use config::ClientSettings;
pub use errors::{CaError, ErrorKind, Result};
pub use resource::{CaConfigInput, CaState, MountPath, Plan, Reconciler};
pub use state::FileStateStore;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
