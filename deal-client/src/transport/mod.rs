//! Transport abstraction for the CRM REST webhook.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying HTTP client (reqwest, mock for testing).
//!
//! # Design
//!
//! The CRM API is request/response only, so the trait has one method:
//! `call()` sends a method name and JSON parameters and returns the decoded
//! JSON body. API-level errors (`{"error": ..., "error_description": ...}`)
//! are surfaced as [`TransportError::Api`] regardless of the HTTP status.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.queue_response(json!({"result": {"ID": "1"}}));
//! let body = transport.call("crm.deal.get", &json!({"id": 1})).await?;
//! ```

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::{MockTransport, RecordedCall};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The webhook URL could not be parsed.
    #[error("invalid webhook url")]
    InvalidUrl,

    /// The request never produced a response.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete within the configured timeout.
    #[error("request timeout")]
    Timeout,

    /// Non-success HTTP status without an API error body.
    #[error("http status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// The CRM answered with an API error object.
    #[error("api error {code}: {description}")]
    Api {
        /// CRM error code (`NOT_FOUND`, `QUERY_LIMIT_EXCEEDED`, ...).
        code: String,
        /// Human-readable description.
        description: String,
    },

    /// The response body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether the remote reported that the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            TransportError::Api { code, description } => {
                code.eq_ignore_ascii_case("NOT_FOUND")
                    || description.to_ascii_lowercase().contains("not found")
            }
            TransportError::Status { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::ConnectionFailed(_) | TransportError::Timeout => true,
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Api { code, .. } => {
                matches!(code.as_str(), "QUERY_LIMIT_EXCEEDED" | "INTERNAL_SERVER_ERROR")
            }
            TransportError::InvalidUrl | TransportError::Decode(_) => false,
        }
    }

    /// Inspect a decoded body for a CRM API error object.
    pub(crate) fn from_api_body(body: &Value) -> Option<Self> {
        let code = body.get("error")?;
        let code = match code {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let description = body
            .get("error_description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(TransportError::Api { code, description })
    }
}

/// Transport trait for calling CRM REST methods.
///
/// Implementations handle the underlying connection mechanism
/// (reqwest, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invoke `method` with JSON `params` and return the decoded response body.
    async fn call(&self, method: &str, params: &Value) -> Result<Value, TransportError>;
}
