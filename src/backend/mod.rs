//! Narrow facade over the backend's path-addressed logical API.
//!
//! The reconciler only needs three verbs against a single path:
//!
//! - **read**: fetch the blob at a path, `None` when nothing is stored there
//! - **write**: submit a payload, optionally receiving response data
//! - **delete**: clear the path
//!
//! [`VaultHttpBackend`] talks to a real server; [`InMemoryBackend`] simulates
//! an SSH secrets engine for tests and offline runs.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::Result;

pub use http::VaultHttpBackend;
pub use memory::{BackendCall, InMemoryBackend};

/// Payload or response body of a logical request
pub type Payload = Map<String, Value>;

/// Data returned by the backend for a path
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogicalResponse {
    /// Response `data` object
    #[serde(default)]
    pub data: Payload,

    /// Warnings attached by the backend
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl LogicalResponse {
    /// Build a response from a data object
    pub fn with_data(data: Payload) -> Self {
        Self { data, warnings: Vec::new() }
    }

    /// String field from the data object, ignoring empty values
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str).filter(|value| !value.is_empty())
    }
}

/// Read/write/delete of path-addressed configuration blobs.
///
/// Implementations must not retry. Transport failures surface as
/// [`CaError::Transport`](crate::errors::CaError::Transport) and backend
/// refusals as [`CaError::BackendRejection`](crate::errors::CaError::BackendRejection).
#[async_trait]
pub trait LogicalBackend: Send + Sync + std::fmt::Debug {
    /// Fetch the content at `path`; `Ok(None)` when the path holds nothing
    async fn read(&self, path: &str) -> Result<Option<LogicalResponse>>;

    /// Write `payload` to `path`
    async fn write(&self, path: &str, payload: &Payload) -> Result<Option<LogicalResponse>>;

    /// Delete the content at `path`; deleting an empty path succeeds
    async fn delete(&self, path: &str) -> Result<()>;
}
