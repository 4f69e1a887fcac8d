//! # Transport Seams
//!
//! `NetworkService` is the GET/PUT interface every transport implements: the
//! live pinned client, the fixture-backed mock and the always-failing stub.
//! `ByteFetcher` is the narrower "give me the bytes at this URL" collaborator
//! used by the image cache; every `NetworkService` is one.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use url::Url;

use super::errors::TransportError;

/// HTTP GET/PUT transport.
///
/// Implementations never retry. A 2xx yields the body, a 4xx yields
/// `TransportError::ClientError` with the body, anything else is
/// `TransportError::NetworkFailure`.
#[async_trait]
pub trait NetworkService: Send + Sync {
    /// GET `url`, merging `headers` into the request.
    async fn get(&self, url: &Url, headers: Option<&HeaderMap>) -> Result<Bytes, TransportError>;

    /// PUT `body` to `url` as JSON, merging `headers` into the request.
    async fn put(&self, url: &Url, headers: Option<&HeaderMap>, body: Bytes) -> Result<Bytes, TransportError>;
}

/// Raw byte source for remote content.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Bytes, TransportError>;
}

#[async_trait]
impl<T> ByteFetcher for T
where
    T: NetworkService + ?Sized,
{
    async fn fetch(&self, url: &Url) -> Result<Bytes, TransportError> {
        self.get(url, None).await
    }
}
