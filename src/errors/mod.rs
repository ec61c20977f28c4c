//! # Error Handling
//!
//! Error types shared by the backend facade, the reconciler and the state store.

pub mod types;

pub use types::{CaError, ErrorKind, Result};
