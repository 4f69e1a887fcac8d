//! # Error Taxonomy
//!
//! Two layers of errors. `TransportError` is what a `NetworkService` reports
//! about the HTTP exchange itself. `ServiceError` is what the response
//! pipeline hands to callers after one reinterpretation pass over the
//! transport error (or over an application error embedded in a 2xx body).
//! Neither carries user-facing text; presentation code renders its own.

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

use super::endpoint::EndpointError;

/// Outcome of a failed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connectivity, TLS, timeout, or any status outside 2xx/4xx.
    /// Transport exceptions that were not already classified carry their
    /// description here.
    #[error("network failure{}", .description.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    NetworkFailure { description: Option<String> },

    /// A 4xx response. The body is kept for reinterpretation.
    #[error("client error ({} bytes of payload)", .0.len())]
    ClientError(Bytes),

    /// The payload did not have the expected shape.
    #[error("payload could not be parsed")]
    ParsingFailure,

    /// The exchange completed without a body.
    #[error("no data received")]
    NoData,
}

impl TransportError {
    /// A `NetworkFailure` with no further detail.
    pub fn network() -> Self {
        TransportError::NetworkFailure { description: None }
    }

    /// A `NetworkFailure` describing an unclassified lower-level error.
    pub fn described(description: impl Into<String>) -> Self {
        TransportError::NetworkFailure {
            description: Some(description.into()),
        }
    }
}

/// Structured reason for an application-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiFailure {
    /// Error code or identifier, e.g. `"404"` or `"400"`. Empty for
    /// request-style payloads, which carry no code.
    pub error: String,
    /// Human-readable reason supplied by the server.
    pub error_description: String,
}

/// Errors surfaced by the response pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("network request failed")]
    Network,

    #[error("response could not be parsed")]
    Parsing,

    /// The server reported an application error, either in a 4xx payload or
    /// embedded in an otherwise successful envelope.
    #[error("{} {}", .0.error, .0.error_description)]
    Api(ApiFailure),

    /// A configured header (e.g. the bearer token) is not a valid header value.
    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    /// The request URL could not be composed from the host configuration.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Auth-level failure payload: `{"error": ..., "error_description": ...}`.
pub type AuthErrorPayload = ApiFailure;

/// One entry of a request-level failure payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

/// Request-level failure payload: `{"errors": [{"message": ...}], "success": false}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestErrorPayload {
    pub errors: Vec<ErrorMessage>,
    pub success: bool,
}

impl From<RequestErrorPayload> for ApiFailure {
    fn from(payload: RequestErrorPayload) -> Self {
        let messages: Vec<String> = payload.errors.into_iter().map(|e| e.message).collect();
        ApiFailure {
            error: String::new(),
            error_description: messages.join("; "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_failure_display_includes_description() {
        assert_eq!(TransportError::network().to_string(), "network failure");
        assert_eq!(
            TransportError::described("dns lookup failed").to_string(),
            "network failure: dns lookup failed"
        );
    }

    #[test]
    fn request_payload_joins_messages() {
        let payload: RequestErrorPayload = serde_json::from_str(
            r#"{"errors":[{"message":"first"},{"message":"second"}],"success":false}"#,
        )
        .unwrap();
        let failure = ApiFailure::from(payload);
        assert_eq!(failure.error, "");
        assert_eq!(failure.error_description, "first; second");
    }

    #[test]
    fn api_error_display_carries_reason() {
        let err = ServiceError::Api(ApiFailure {
            error: "404".to_string(),
            error_description: "not_found".to_string(),
        });
        assert!(err.to_string().contains("not_found"));
    }
}
