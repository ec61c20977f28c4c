//! # Configuration Management
//!
//! Settings for reaching the secrets backend. Values come from the CLI, the
//! environment (a `.env` file is honoured), or `~/.vault-ssh-ca/config.toml`.

pub mod settings;

pub use settings::{ClientSettings, DEFAULT_ADDRESS, DEFAULT_STATE_DIR, DEFAULT_TIMEOUT_SECONDS};
