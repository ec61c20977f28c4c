//! HTTP implementation of [`LogicalBackend`] for Vault-compatible servers.
//!
//! Requests go to `{address}/v1/{path}` with the token in `X-Vault-Token`
//! and, when configured, the namespace in `X-Vault-Namespace`.
//!
//! Status mapping:
//!
//! | Status | read | write | delete |
//! |---|---|---|---|
//! | 200 with body | content | content | ok |
//! | 204 | absent | no content | ok |
//! | 404 | absent | rejection | ok |
//! | 401, 403, 429, 5xx | transport | transport | transport |
//! | other 4xx | rejection | rejection | rejection |

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace, Instrument};

use super::{LogicalBackend, LogicalResponse, Payload};
use crate::config::ClientSettings;
use crate::errors::{CaError, Result};
use crate::secrets::SecretString;

/// Raw response envelope; `data` and `warnings` may be `null`
#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    data: Option<Payload>,
    #[serde(default)]
    warnings: Option<Vec<String>>,
}

/// Error body returned by the backend
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Vault-compatible HTTP backend
#[derive(Clone)]
pub struct VaultHttpBackend {
    client: Client,
    address: String,
    token: Option<SecretString>,
    namespace: Option<String>,
}

impl std::fmt::Debug for VaultHttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultHttpBackend")
            .field("address", &self.address)
            .field("token", &self.token)
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl VaultHttpBackend {
    /// Create a new HTTP backend from validated settings
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        settings.validate()?;

        let client = Client::builder().timeout(settings.timeout()).build().map_err(|e| {
            CaError::config(format!("Failed to build backend HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            address: settings.address.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            namespace: settings.namespace.clone(),
        })
    }

    /// Get the backend address
    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(token) = &self.token {
            builder = builder.header("X-Vault-Token", token.expose_secret());
        }
        if let Some(namespace) = &self.namespace {
            builder = builder.header("X-Vault-Namespace", namespace);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request to '{}' timed out", path)
            } else if e.is_connect() {
                format!("failed to connect to backend for '{}'", path)
            } else {
                format!("request to '{}' failed", path)
            };
            CaError::transport_with_source(message, Box::new(e))
        })?;

        debug!(status = %response.status(), "Backend response received");
        Ok(response)
    }

    async fn parse_content(path: &str, response: Response) -> Result<Option<LogicalResponse>> {
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.text().await.map_err(|e| {
            CaError::transport_with_source(
                format!("failed to read response body for '{}'", path),
                Box::new(e),
            )
        })?;

        if body.trim().is_empty() {
            return Ok(None);
        }

        let raw: RawResponse = serde_json::from_str(&body).map_err(|e| {
            CaError::transport_with_source(
                format!("malformed response body for '{}'", path),
                Box::new(e),
            )
        })?;

        let warnings = raw.warnings.unwrap_or_default();
        Ok(raw.data.map(|data| LogicalResponse { data, warnings }))
    }

    async fn error_from(path: &str, response: Response) -> CaError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        trace!(status = %status, "Backend error body received");

        let mut errors = serde_json::from_str::<ErrorBody>(&body).unwrap_or_default().errors;
        if errors.is_empty() && !body.trim().is_empty() {
            errors.push(body.trim().to_string());
        }

        if is_transport_status(status) {
            let detail =
                if errors.is_empty() { String::new() } else { format!(": {}", errors.join("; ")) };
            CaError::transport(format!("backend returned {} for '{}'{}", status, path, detail))
        } else {
            CaError::rejected(path, status.as_u16(), errors)
        }
    }
}

fn is_transport_status(status: StatusCode) -> bool {
    !status.is_client_error()
        || matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
        )
}

#[async_trait]
impl LogicalBackend for VaultHttpBackend {
    async fn read(&self, path: &str) -> Result<Option<LogicalResponse>> {
        async {
            let response = self.send(self.request(Method::GET, path), path).await?;
            match response.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => Self::parse_content(path, response).await,
                _ => Err(Self::error_from(path, response).await),
            }
        }
        .instrument(crate::backend_span!("GET", path))
        .await
    }

    async fn write(&self, path: &str, payload: &Payload) -> Result<Option<LogicalResponse>> {
        async {
            debug!(fields = payload.len(), "Writing payload");
            let response = self.send(self.request(Method::POST, path).json(payload), path).await?;
            if response.status().is_success() {
                Self::parse_content(path, response).await
            } else {
                Err(Self::error_from(path, response).await)
            }
        }
        .instrument(crate::backend_span!("POST", path))
        .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        async {
            let response = self.send(self.request(Method::DELETE, path), path).await?;
            match response.status() {
                StatusCode::NOT_FOUND => Ok(()),
                status if status.is_success() => Ok(()),
                _ => Err(Self::error_from(path, response).await),
            }
        }
        .instrument(crate::backend_span!("DELETE", path))
        .await
    }
}
