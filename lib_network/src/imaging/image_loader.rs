//! # Image Cache Actor
//!
//! `ImageLoader` owns a bounded cache of decoded images and a registry of
//! fetches that are still running. Both live behind one async mutex, so every
//! mutation (cache read, registry insert, registry removal) is serialized.
//!
//! Per URL:
//!
//! 1. A cached image is returned without I/O.
//! 2. A running fetch for the URL is joined; every concurrent caller shares
//!    the outcome of a single byte fetch.
//! 3. Otherwise the first caller registers a new fetch. It runs as its own
//!    tokio task, so a caller that stops waiting does not cancel it for the
//!    others.
//!
//! Bytes that do not decode are `Ok(None)`, not an error. Fetch errors reach
//! every waiter. Once a fetch settles its registration is dropped, so the
//! next call after a failure or an empty result retries. The byte fetch and
//! decode run in a task of their own; a panic there settles the fetch as a
//! `NetworkFailure`.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use url::Url;

use super::bounded_cache::{BoundedCache, DEFAULT_COST_LIMIT, DEFAULT_COUNT_LIMIT};
use crate::loggers::LoggerLocal;
use crate::retrieve::errors::TransportError;
use crate::retrieve::ky_http::{ApiClient, ClientSetupError};
use crate::retrieve::transport::ByteFetcher;

/// A decoded image as produced by the `image` crate.
pub type DecodedImage = image::DynamicImage;

type FetchOutcome = Result<Option<Arc<DecodedImage>>, TransportError>;
type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

struct InFlight {
    /// Generation of this fetch; a settled fetch only unregisters itself.
    id: u64,
    fetch: SharedFetch,
}

struct LoaderState {
    cache: BoundedCache<Url, Arc<DecodedImage>>,
    in_flight: HashMap<Url, InFlight>,
    next_id: u64,
}

struct LoaderInner {
    source: Arc<dyn ByteFetcher>,
    state: Mutex<LoaderState>,
}

/// Handle to an image cache. Clones share the same cache and registry.
#[derive(Clone)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
    logger: Arc<LoggerLocal>,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader").finish_non_exhaustive()
    }
}

impl ImageLoader {
    /// A loader fetching over plain HTTPS with default trust.
    pub fn live() -> Result<Self, ClientSetupError> {
        Ok(Self::with_source(Arc::new(ApiClient::new()?)))
    }

    /// A loader reading bytes from `source`, with the default 100 entry and
    /// 50 MB ceilings.
    pub fn with_source(source: Arc<dyn ByteFetcher>) -> Self {
        let count_limit = NonZeroUsize::new(DEFAULT_COUNT_LIMIT).unwrap_or(NonZeroUsize::MIN);
        Self::with_limits(source, count_limit, DEFAULT_COST_LIMIT)
    }

    /// A loader with explicit count and cost (bytes) ceilings.
    pub fn with_limits(source: Arc<dyn ByteFetcher>, count_limit: NonZeroUsize, cost_limit: usize) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                source,
                state: Mutex::new(LoaderState {
                    cache: BoundedCache::new(count_limit, cost_limit),
                    in_flight: HashMap::new(),
                    next_id: 0,
                }),
            }),
            logger: Arc::new(LoggerLocal::new("ImageLoader", None)),
        }
    }

    /// Replaces the diagnostics logger used by fetches this handle starts.
    pub fn with_logger(mut self, logger: Arc<LoggerLocal>) -> Self {
        self.logger = logger;
        self
    }

    /// Returns the image at `url`, fetching it at most once however many
    /// callers ask concurrently.
    pub async fn load_image(&self, url: &Url) -> FetchOutcome {
        let fetch = {
            let mut guard = self.inner.state.lock().await;
            let state = &mut *guard;

            if let Some(image) = state.cache.get(url) {
                return Ok(Some(Arc::clone(image)));
            }

            match state.in_flight.get(url) {
                Some(running) => running.fetch.clone(),
                None => {
                    let id = state.next_id;
                    state.next_id += 1;

                    let fetch = spawn_fetch(Arc::clone(&self.inner), Arc::clone(&self.logger), url.clone(), id);
                    state.in_flight.insert(
                        url.clone(),
                        InFlight {
                            id,
                            fetch: fetch.clone(),
                        },
                    );
                    fetch
                }
            }
        };

        fetch.await
    }

    /// Drops every cached image and forgets running fetches. Forgotten
    /// fetches still answer their waiters but are not cached.
    pub async fn clear_cache(&self) {
        let mut state = self.inner.state.lock().await;
        state.cache.clear();
        state.in_flight.clear();
    }

    /// Drops the cached image for `url`, if any.
    pub async fn remove_image(&self, url: &Url) {
        self.inner.state.lock().await.cache.remove(url);
    }

    pub async fn cached_count(&self) -> usize {
        self.inner.state.lock().await.cache.len()
    }

    pub async fn in_flight_count(&self) -> usize {
        self.inner.state.lock().await.in_flight.len()
    }
}

fn spawn_fetch(inner: Arc<LoaderInner>, logger: Arc<LoggerLocal>, url: Url, id: u64) -> SharedFetch {
    tokio::spawn(settle_fetch(inner, logger, url, id))
        .map(|joined| joined.unwrap_or_else(|e| Err(TransportError::described(e.to_string()))))
        .boxed()
        .shared()
}

/// Runs the fetch, then unregisters it and caches the image, whatever the
/// fetch task did.
async fn settle_fetch(inner: Arc<LoaderInner>, logger: Arc<LoggerLocal>, url: Url, id: u64) -> FetchOutcome {
    let outcome = tokio::spawn(fetch_and_decode(
        Arc::clone(&inner.source),
        Arc::clone(&logger),
        url.clone(),
    ))
    .await
    .unwrap_or_else(|e| {
        logger.error(&format!("Image fetch for {url} did not complete: {e}"), None);
        Err(TransportError::described(e.to_string()))
    });

    let mut state = inner.state.lock().await;
    let current = state.in_flight.get(&url).is_some_and(|running| running.id == id);
    if current {
        state.in_flight.remove(&url);
        if let Ok(Some(image)) = &outcome {
            let cost = image.as_bytes().len();
            if !state.cache.insert(url.clone(), Arc::clone(image), cost) {
                logger.debug(&format!("Image at {url} ({cost} bytes) exceeds the cache ceiling"), None);
            }
        }
    }

    outcome
}

async fn fetch_and_decode(source: Arc<dyn ByteFetcher>, logger: Arc<LoggerLocal>, url: Url) -> FetchOutcome {
    let bytes = source.fetch(&url).await?;
    Ok(decode(bytes, &logger, &url).await)
}

async fn decode(bytes: Bytes, logger: &LoggerLocal, url: &Url) -> Option<Arc<DecodedImage>> {
    let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await;
    match decoded {
        Ok(Ok(image)) => Some(Arc::new(image)),
        Ok(Err(e)) => {
            logger.debug(&format!("Payload from {url} is not a displayable image: {e}"), None);
            None
        }
        Err(e) => {
            logger.error(&format!("Image decoding for {url} aborted: {e}"), None);
            None
        }
    }
}
