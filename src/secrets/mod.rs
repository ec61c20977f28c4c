//! Handling of sensitive values: CA private keys and backend tokens.
//!
//! # Security Considerations
//!
//! - Secret values are never logged or exposed in error messages
//! - Plan output shows `(sensitive value)` for changed secrets
//! - The state file is the one place where a private key is written in clear,
//!   because the backend never returns it and the last applied value must be
//!   kept to detect changes

pub mod types;

pub use types::{SecretString, SENSITIVE_PLACEHOLDER};
