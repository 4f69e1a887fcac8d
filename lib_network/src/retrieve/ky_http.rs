//! # HTTP Retrieval Client
//!
//! `ApiClient` is the live `NetworkService`: a `reqwest` client over a rustls
//! configuration whose certificate verifier is the pinning
//! `PinnedTrustVerifier`.
//!
//! Session policy: a fixed 30 second request timeout, `no-cache` request
//! headers, no cookie store, and no idle connection reuse, so every call is a
//! fresh fetch with its own handshake and trust evaluation. The client never
//! retries; retry and backoff belong to callers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::{Method, Request, StatusCode};
use rustls_pki_types::CertificateDer;
use thiserror::Error;
use url::Url;

use super::errors::TransportError;
use super::transport::NetworkService;
use super::trust::{PinnedTrustVerifier, TrustPolicy, TrustSetupError};

/// Every request is abandoned after this long.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failures while building the live client.
#[derive(Debug, Error)]
pub enum ClientSetupError {
    #[error(transparent)]
    Trust(#[from] TrustSetupError),

    #[error("TLS configuration failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("HTTP client could not be built: {0}")]
    Http(#[from] reqwest::Error),
}

/// Live HTTP transport with optional certificate pinning.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// The underlying reqwest client, configured once at construction.
    inner: reqwest::Client,
    /// Whether a pinned certificate set is in force.
    pinned: bool,
}

impl ApiClient {
    /// A client using standard certificate validation.
    pub fn new() -> Result<Self, ClientSetupError> {
        Self::with_certificates(None, TrustPolicy::default())
    }

    /// A client whose TLS trust is pinned to `certificates` under `policy`.
    /// `None` or an empty list behaves exactly like [`ApiClient::new`].
    pub fn with_certificates(
        certificates: Option<Vec<CertificateDer<'static>>>,
        policy: TrustPolicy,
    ) -> Result<Self, ClientSetupError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = PinnedTrustVerifier::new(Arc::clone(&provider), certificates.as_deref(), policy)?;
        let pinned = verifier.is_pinned();

        let tls = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        let inner = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .timeout(REQUEST_TIMEOUT)
            .default_headers(no_cache_headers())
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self { inner, pinned })
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Executes `request` and classifies the outcome.
    async fn execute(&self, request: Request) -> Result<Bytes, TransportError> {
        let url = request.url().clone();
        let response = self.inner.execute(request).await.map_err(|e| {
            tracing::debug!("Request to {} failed: {}", url, e);
            TransportError::described(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::described(e.to_string()))?;

        classify_response(status, body)
    }
}

#[async_trait]
impl NetworkService for ApiClient {
    async fn get(&self, url: &Url, headers: Option<&HeaderMap>) -> Result<Bytes, TransportError> {
        let request = build_request(Method::GET, url, headers, None);
        self.execute(request).await
    }

    async fn put(&self, url: &Url, headers: Option<&HeaderMap>, body: Bytes) -> Result<Bytes, TransportError> {
        let request = build_request(Method::PUT, url, headers, Some(body));
        self.execute(request).await
    }
}

/// Builds the request descriptor for one call.
///
/// PUT and POST get `Content-Type: application/json` first; caller headers
/// are applied afterwards, so a caller value for the same name wins.
pub fn build_request(method: Method, url: &Url, headers: Option<&HeaderMap>, body: Option<Bytes>) -> Request {
    let mut request = Request::new(method.clone(), url.clone());

    if method == Method::PUT || method == Method::POST {
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    if let Some(extra) = headers {
        for (name, value) in extra.iter() {
            request.headers_mut().insert(name.clone(), value.clone());
        }
    }

    if let Some(bytes) = body {
        *request.body_mut() = Some(bytes.into());
    }

    request
}

/// 2xx returns the body, 4xx is a `ClientError` carrying the body, anything
/// else is a plain `NetworkFailure`.
pub fn classify_response(status: StatusCode, body: Bytes) -> Result<Bytes, TransportError> {
    if status.is_success() {
        Ok(body)
    } else if status.is_client_error() {
        Err(TransportError::ClientError(body))
    } else {
        Err(TransportError::network())
    }
}

fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}
