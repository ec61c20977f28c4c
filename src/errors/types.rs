//! # Error Types
//!
//! Error types for SSH CA reconciliation using `thiserror`.
//!
//! Every variant belongs to exactly one [`ErrorKind`] so callers can tell a
//! local validation failure apart from a backend rejection, a transport
//! failure, or a CA that survived its own deletion.

use std::fmt;

/// Custom result type for CA reconciliation operations
pub type Result<T> = std::result::Result<T, CaError>;

/// Coarse classification of [`CaError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally before any network call
    Validation,
    /// The backend refused the request (malformed key material, unknown managed key)
    BackendRejection,
    /// Connectivity, authentication, throttling or server failures
    Transport,
    /// Destroy verification found the CA still present
    Drift,
    /// The backend holds no CA configuration where one was required
    NotFound,
    /// Local state file could not be read or written
    State,
    /// Client configuration is invalid
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::BackendRejection => write!(f, "backend_rejection"),
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Drift => write!(f, "drift"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::State => write!(f, "state"),
            ErrorKind::Config => write!(f, "config"),
        }
    }
}

/// Main error type for SSH CA reconciliation
#[derive(thiserror::Error, Debug)]
pub enum CaError {
    /// Two mutually exclusive options were both set
    #[error("Conflicting options: '{first}' and '{second}' cannot be set together")]
    ConflictingOptions { first: &'static str, second: &'static str },

    /// None of the key mode selectors was set
    #[error(
        "Missing key mode: exactly one of 'generate_signing_key', 'private_key', \
         'managed_key_id' or 'managed_key_name' must be set"
    )]
    MissingKeyMode,

    /// A single attribute holds an unusable value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Persisted state does not match the shape of its declared schema version
    #[error("State shape mismatch for schema version {version}: {reason}")]
    StateShape { version: u64, reason: String },

    /// Persisted state carries a schema version this build does not know
    #[error("Unsupported state schema version {found} (current is {current})")]
    UnsupportedSchemaVersion { found: u64, current: u64 },

    /// The backend refused a request
    #[error("Backend rejected request to '{path}' (status {status}): {}", .errors.join("; "))]
    BackendRejection { path: String, status: u16, errors: Vec<String> },

    /// Connectivity, auth, timeout or server-side failures
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Delete succeeded but the CA is still reported
    #[error("CA information still exists for backend \"{backend}\"")]
    StillPresent { backend: String },

    /// No CA configuration at the mount
    #[error("No CA configuration found for backend \"{backend}\"")]
    NotFound { backend: String },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CaError {
    /// Create a conflicting options error
    pub fn conflicting(first: &'static str, second: &'static str) -> Self {
        Self::ConflictingOptions { first, second }
    }

    /// Create an invalid field error
    pub fn invalid_field<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::InvalidField { field: field.into(), reason: reason.into() }
    }

    /// Create a state shape error
    pub fn state_shape<R: Into<String>>(version: u64, reason: R) -> Self {
        Self::StateShape { version, reason: reason.into() }
    }

    /// Create a backend rejection error
    pub fn rejected<P: Into<String>>(path: P, status: u16, errors: Vec<String>) -> Self {
        Self::BackendRejection { path: path.into(), status, errors }
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport { message: message.into(), source: None }
    }

    /// Create a transport error with source
    pub fn transport_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Transport { message: message.into(), source: Some(source) }
    }

    /// Create a still-present (drift) error
    pub fn still_present<B: fmt::Display>(backend: B) -> Self {
        Self::StillPresent { backend: backend.to_string() }
    }

    /// Create a not found error
    pub fn not_found<B: fmt::Display>(backend: B) -> Self {
        Self::NotFound { backend: backend.to_string() }
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io { source, context: context.into() }
    }

    /// Create a serialization error with context
    pub fn serialization<S: Into<String>>(context: S, source: serde_json::Error) -> Self {
        Self::Serialization { source, context: context.into() }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaError::ConflictingOptions { .. }
            | CaError::MissingKeyMode
            | CaError::InvalidField { .. }
            | CaError::StateShape { .. }
            | CaError::UnsupportedSchemaVersion { .. } => ErrorKind::Validation,
            CaError::BackendRejection { .. } => ErrorKind::BackendRejection,
            CaError::Transport { .. } => ErrorKind::Transport,
            CaError::StillPresent { .. } => ErrorKind::Drift,
            CaError::NotFound { .. } => ErrorKind::NotFound,
            CaError::Io { .. } | CaError::Serialization { .. } => ErrorKind::State,
            CaError::Config { .. } => ErrorKind::Config,
        }
    }

    /// True when the error was raised before contacting the backend
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl From<validator::ValidationErrors> for CaError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::config(errors.to_string())
    }
}
