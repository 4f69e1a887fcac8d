//! # Endpoint Builder
//!
//! Composes request URLs from a `CustomHost` and an api path. A `CustomHost`
//! describes one environment (debug, qa, production); its optional `api` and
//! `query_items` supersede the values an endpoint asks for.
//!
//! Construction never touches the network. A malformed host is reported as
//! `EndpointError` instead of panicking.

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Errors raised while composing a URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("invalid host: {0:?}")]
    InvalidHost(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A single `name=value` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryItem {
    pub name: String,
    pub value: String,
}

impl QueryItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Environment-specific host settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomHost {
    /// `https` when true, `http` otherwise.
    #[serde(default = "default_secure")]
    pub secure: bool,
    /// Host name, e.g. `example.co.uk`.
    pub host: String,
    /// Base path such as `v1`; a leading `/` is added when missing.
    #[serde(default)]
    pub path: Option<String>,
    /// Overrides the api requested by an endpoint.
    #[serde(default)]
    pub api: Option<String>,
    /// Overrides the query items requested by an endpoint.
    #[serde(default)]
    pub query_items: Option<Vec<QueryItem>>,
}

fn default_secure() -> bool {
    true
}

impl CustomHost {
    /// A secure host with no path or overrides.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            secure: true,
            host: host.into(),
            path: None,
            api: None,
            query_items: None,
        }
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = Some(api.into());
        self
    }

    pub fn with_query_items(mut self, query_items: Vec<QueryItem>) -> Self {
        self.query_items = Some(query_items);
        self
    }

    /// Splits an absolute base URL such as `https://api.example.com/2.3`
    /// into scheme, host (with port, if any) and path.
    pub fn from_base_url(base_url: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(base_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| EndpointError::InvalidHost(base_url.to_string()))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let path = url.path().trim_end_matches('/');

        Ok(Self {
            secure: url.scheme() == "https",
            host,
            path: (!path.is_empty()).then(|| path.to_string()),
            api: None,
            query_items: None,
        })
    }
}

/// An immutable request target. The URL is computed and validated once at
/// construction and is a pure function of the other fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    is_secure: bool,
    host: String,
    path: Option<String>,
    api: String,
    query_items: Vec<QueryItem>,
    url: Url,
}

impl Endpoint {
    /// Builds an endpoint for `api` on `custom_host`. Host-level `api` and
    /// `query_items` win over the arguments.
    pub fn new(
        custom_host: &CustomHost,
        api: &str,
        query_items: Option<Vec<QueryItem>>,
    ) -> Result<Self, EndpointError> {
        let api = custom_host.api.clone().unwrap_or_else(|| api.to_string());
        let query_items = custom_host
            .query_items
            .clone()
            .or(query_items)
            .unwrap_or_default();
        let path = custom_host.path.as_deref().and_then(normalize_path);

        let url = compose_url(custom_host.secure, &custom_host.host, path.as_deref(), &api, &query_items)?;

        Ok(Self {
            is_secure: custom_host.secure,
            host: custom_host.host.clone(),
            path,
            api,
            query_items,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn query_items(&self) -> &[QueryItem] {
        &self.query_items
    }

    pub fn is_secure(&self) -> bool {
        self.is_secure
    }
}

/// `None` for an empty path; otherwise the path with a leading `/`.
fn normalize_path(path: &str) -> Option<String> {
    if path.is_empty() {
        None
    } else if path.starts_with('/') {
        Some(path.to_string())
    } else {
        Some(format!("/{path}"))
    }
}

fn compose_url(
    secure: bool,
    host: &str,
    path: Option<&str>,
    api: &str,
    query_items: &[QueryItem],
) -> Result<Url, EndpointError> {
    if host.is_empty() || host.contains(['/', '?', '#', '@', ' ']) {
        return Err(EndpointError::InvalidHost(host.to_string()));
    }

    let scheme = if secure { "https" } else { "http" };
    let mut url = Url::parse(&format!("{scheme}://{host}"))?;
    url.set_path(&format!("{}{}", path.unwrap_or(""), api));

    if !query_items.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query_items.iter().map(|q| (q.name.as_str(), q.value.as_str())));
    }

    Ok(url)
}
