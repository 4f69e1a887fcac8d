//! # Fixture and Failure Transports
//!
//! `NetworkServicesMock` answers requests from local JSON files so the whole
//! pipeline can run offline: the URL path is looked up in an explicit mapping
//! table and the mapped `<filename>.json` is returned as the body.
//! `NetworkServicesFailed` fails every call, for exercising error paths.
//!
//! Mappings can travel through an environment variable as base64-encoded JSON
//! (`encode_mock_data` / `decode_mock_data`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::TransportError;
use super::transport::NetworkService;

/// One fixture mapping: requests whose path equals `api` are answered with
/// `<filename>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMockData {
    /// URL path to match, e.g. `/2.3/users`.
    pub api: String,
    /// Fixture file name without the `.json` extension.
    pub filename: String,
    /// Directory holding the file; the mock's base directory when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_path: Option<PathBuf>,
}

impl NetworkMockData {
    pub fn new(api: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            filename: filename.into(),
            bundle_path: None,
        }
    }
}

/// Encodes mappings as base64 JSON for passing through the environment.
pub fn encode_mock_data(mock_data: &[NetworkMockData]) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(mock_data)?;
    Ok(general_purpose::STANDARD.encode(json))
}

/// Reverses [`encode_mock_data`]. Malformed input yields `None`.
pub fn decode_mock_data(encoded: &str) -> Option<Vec<NetworkMockData>> {
    let json = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    serde_json::from_slice(&json).ok()
}

/// Fixture-backed transport. GET and PUT both return the mapped file.
#[derive(Debug, Clone)]
pub struct NetworkServicesMock {
    base_dir: PathBuf,
    mapper: HashMap<String, PathBuf>,
}

impl NetworkServicesMock {
    /// A mock resolving `path -> filename` under `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, mapper: HashMap<String, String>) -> Self {
        let base_dir = base_dir.into();
        let mapper = mapper
            .into_iter()
            .map(|(api, filename)| (api, base_dir.join(format!("{filename}.json"))))
            .collect();
        Self { base_dir, mapper }
    }

    /// A mock built from `NetworkMockData` entries; each entry's
    /// `bundle_path` overrides `base_dir`.
    pub fn from_mock_data(base_dir: impl Into<PathBuf>, mock_data: &[NetworkMockData]) -> Self {
        let base_dir = base_dir.into();
        let mapper = mock_data
            .iter()
            .map(|entry| {
                let dir = entry.bundle_path.as_deref().unwrap_or(&base_dir);
                (entry.api.clone(), dir.join(format!("{}.json", entry.filename)))
            })
            .collect();
        Self { base_dir, mapper }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The fixture file that would answer `url`, if any.
    pub fn resolve(&self, url: &Url) -> Option<&Path> {
        self.mapper.get(url.path()).map(PathBuf::as_path)
    }

    async fn load_file(&self, url: &Url) -> Result<Bytes, TransportError> {
        let path = self.resolve(url).ok_or_else(TransportError::network)?;
        match tokio::fs::read(path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) => {
                tracing::debug!("Fixture {} for {} unreadable: {}", path.display(), url, e);
                Err(TransportError::network())
            }
        }
    }
}

#[async_trait]
impl NetworkService for NetworkServicesMock {
    async fn get(&self, url: &Url, _headers: Option<&HeaderMap>) -> Result<Bytes, TransportError> {
        self.load_file(url).await
    }

    async fn put(&self, url: &Url, _headers: Option<&HeaderMap>, _body: Bytes) -> Result<Bytes, TransportError> {
        self.load_file(url).await
    }
}

/// Transport whose every call fails with `NetworkFailure`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkServicesFailed;

#[async_trait]
impl NetworkService for NetworkServicesFailed {
    async fn get(&self, _url: &Url, _headers: Option<&HeaderMap>) -> Result<Bytes, TransportError> {
        Err(TransportError::network())
    }

    async fn put(&self, _url: &Url, _headers: Option<&HeaderMap>, _body: Bytes) -> Result<Bytes, TransportError> {
        Err(TransportError::network())
    }
}
