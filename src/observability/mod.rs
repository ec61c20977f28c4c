//! # Observability
//!
//! Structured logging for reconciliation runs.

pub mod logging;

pub use logging::{build_subscriber, init_logging, log_settings_info, LogFormat};
