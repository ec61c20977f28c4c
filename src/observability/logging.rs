//! # Structured Logging
//!
//! Span macros and subscriber setup built on the tracing ecosystem.
//!
//! Log fields never carry key material. Provided private keys are identified
//! by [`SecretString::fingerprint`](crate::secrets::SecretString::fingerprint).

use tracing::Subscriber;
use tracing_subscriber::{fmt, EnvFilter};

/// Create a tracing span around one reconciliation operation against a mount.
///
/// ```rust,ignore
/// let span = resource_span!("create", &backend);
/// let span = resource_span!("delete", &backend, phase = "deleting");
/// ```
#[macro_export]
macro_rules! resource_span {
    ($operation:expr, $backend:expr) => {
        tracing::info_span!(
            "ssh_ca",
            operation = %$operation,
            backend = %$backend,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $backend:expr, $($field:tt)*) => {
        tracing::info_span!(
            "ssh_ca",
            operation = %$operation,
            backend = %$backend,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span around one backend API call.
#[macro_export]
macro_rules! backend_span {
    ($method:expr, $path:expr) => {
        tracing::debug_span!("backend_request", method = %$method, path = %$path)
    };
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Build the subscriber `init_logging` installs.
///
/// `RUST_LOG` wins over `verbose`.
pub fn build_subscriber(verbose: bool, format: LogFormat) -> Box<dyn Subscriber + Send + Sync> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Text => {
            Box::new(fmt().with_env_filter(filter).with_writer(std::io::stderr).finish())
        }
        LogFormat::Json => {
            Box::new(fmt().json().with_env_filter(filter).with_writer(std::io::stderr).finish())
        }
    }
}

/// Install the global subscriber.
///
/// Installing twice is not an error, since integration tests may have set a
/// subscriber already.
pub fn init_logging(verbose: bool, format: LogFormat) {
    if tracing::subscriber::set_global_default(build_subscriber(verbose, format)).is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}

/// Log the effective client settings at startup
pub fn log_settings_info(settings: &crate::config::ClientSettings) {
    tracing::info!(
        address = %settings.address,
        namespace = settings.namespace.as_deref().unwrap_or(""),
        token_configured = settings.token.is_some(),
        timeout_seconds = settings.timeout_seconds,
        state_dir = %settings.state_dir.display(),
        "SSH CA client configuration"
    );
}
