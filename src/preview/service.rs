//! Preview Service: the cache-backed transformation pipeline.
//!
//! The service is the main entry point for preview requests. It ties together:
//! - Request fingerprinting
//! - LRU cache lookups
//! - Source fetching via a [`Fetcher`]
//! - Decode, scale, crop and re-encode via the [`TransformEngine`]
//! - Result caching
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         PreviewService                           │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                          get()                             │  │
//! │  │  1. Fingerprint request   4. Fetch source bytes            │  │
//! │  │  2. Check cache           5. Transform on blocking pool    │  │
//! │  │  3. Join or lead flight   6. Cache, publish & return       │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │          │                      │                      │         │
//! │          ▼                      ▼                      ▼         │
//! │   ┌──────────────┐      ┌──────────────┐     ┌─────────────────┐ │
//! │   │ PreviewCache │      │   Fetcher    │     │ TransformEngine │ │
//! │   └──────────────┘      └──────────────┘     └─────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Concurrency
//!
//! The cache lock is held only for bookkeeping, never across a fetch or a
//! transform. Concurrent misses for the same fingerprint are collapsed: the
//! first caller becomes the leader and does the work, later callers wait on a
//! watch channel for the leader's result. Misses for different fingerprints
//! run in parallel.
//!
//! A cancelled leader publishes nothing. Its in-flight entry is removed when
//! the leader returns or is dropped, and any waiters start over with their
//! own cancellation token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{FetchError, PreviewError};
use crate::fetch::Fetcher;

use super::cache::{PreviewCache, DEFAULT_PREVIEW_CACHE_CAPACITY};
use super::request::PreviewRequest;
use super::transform::TransformEngine;

/// Result shared between the leader of a flight and its waiters.
///
/// `None` until the leader publishes.
type SharedResult = Option<Result<Bytes, PreviewError>>;

type InFlightMap = Mutex<HashMap<String, Arc<watch::Sender<SharedResult>>>>;

// =============================================================================
// Response Types
// =============================================================================

/// Response from the preview service.
#[derive(Debug, Clone)]
pub struct PreviewResponse {
    /// The encoded preview
    pub data: Bytes,

    /// Whether the preview was served from cache
    pub cache_hit: bool,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached previews
    pub entries: usize,

    /// Maximum number of cached previews
    pub capacity: usize,

    /// Lookups answered from cache
    pub hits: u64,

    /// Lookups that had to go through the pipeline
    pub misses: u64,
}

// =============================================================================
// Preview Service
// =============================================================================

/// Service for generating and caching previews.
///
/// # Type Parameters
///
/// * `F` - The fetcher used to retrieve source images
///
/// # Example
///
/// ```ignore
/// use image_previewer::fetch::HttpFetcher;
/// use image_previewer::preview::{PreviewRequest, PreviewService};
/// use tokio_util::sync::CancellationToken;
///
/// let service = PreviewService::with_cache_capacity(HttpFetcher::new()?, 100);
///
/// let request = PreviewRequest::fill("https://example.com/cat.jpg", 300, 200);
/// let response = service.get(&request, &CancellationToken::new()).await?;
///
/// println!("{} bytes, cache hit: {}", response.data.len(), response.cache_hit);
/// ```
pub struct PreviewService<F: Fetcher> {
    fetcher: Arc<F>,

    cache: PreviewCache,

    engine: TransformEngine,

    /// Fingerprints currently being fetched or transformed
    in_flight: InFlightMap,

    hits: AtomicU64,
    misses: AtomicU64,
}

/// What a caller does after consulting the in-flight map.
enum Flight {
    Leader(Arc<watch::Sender<SharedResult>>),
    Waiter(watch::Receiver<SharedResult>),
}

impl<F: Fetcher> PreviewService<F> {
    /// Create a service with the default cache capacity.
    pub fn new(fetcher: F) -> Self {
        Self::with_cache_capacity(fetcher, DEFAULT_PREVIEW_CACHE_CAPACITY)
    }

    /// Create a service caching at most `capacity` previews (0 disables caching).
    pub fn with_cache_capacity(fetcher: F, capacity: usize) -> Self {
        Self::with_shared_fetcher(Arc::new(fetcher), capacity)
    }

    /// Create a service around a fetcher shared with other components.
    pub fn with_shared_fetcher(fetcher: Arc<F>, capacity: usize) -> Self {
        Self {
            fetcher,
            cache: PreviewCache::with_capacity(capacity),
            engine: TransformEngine::new(),
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a preview, using the cache when available.
    pub async fn get(
        &self,
        request: &PreviewRequest,
        cancel: &CancellationToken,
    ) -> Result<PreviewResponse, PreviewError> {
        self.get_with_headers(request, &HeaderMap::new(), cancel)
            .await
    }

    /// Get a preview, forwarding `headers` to the origin on a miss.
    ///
    /// Headers are not part of the fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The source cannot be fetched or the caller cancels first
    /// - The source cannot be decoded, scaled, cropped or encoded
    ///
    /// Failures are never cached.
    pub async fn get_with_headers(
        &self,
        request: &PreviewRequest,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<PreviewResponse, PreviewError> {
        let key = request.fingerprint();

        if let Some(data) = self.cache.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Preview cache hit");
            return Ok(PreviewResponse {
                data,
                cache_hit: true,
            });
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Preview cache miss");

        loop {
            match self.join_flight(&key) {
                Flight::Leader(tx) => return self.lead(&key, tx, request, headers, cancel).await,
                Flight::Waiter(rx) => {
                    let shared = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Err(PreviewError::Fetch(FetchError::Cancelled));
                        }
                        shared = wait_for_leader(rx) => shared,
                    };

                    match shared {
                        Some(result) => {
                            return result.map(|data| PreviewResponse {
                                data,
                                cache_hit: false,
                            })
                        }
                        // Leader was cancelled or dropped; try again
                        None => debug!(key = %key, "Preview flight abandoned, retrying"),
                    }
                }
            }
        }
    }

    fn join_flight(&self, key: &str) -> Flight {
        let mut in_flight = self.in_flight.lock();

        if let Some(tx) = in_flight.get(key) {
            return Flight::Waiter(tx.subscribe());
        }

        let (tx, _) = watch::channel(None);
        let tx = Arc::new(tx);
        in_flight.insert(key.to_string(), Arc::clone(&tx));
        Flight::Leader(tx)
    }

    async fn lead(
        &self,
        key: &str,
        tx: Arc<watch::Sender<SharedResult>>,
        request: &PreviewRequest,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<PreviewResponse, PreviewError> {
        let _guard = FlightGuard {
            in_flight: &self.in_flight,
            key,
        };

        // A previous leader may have finished between our lookup and now
        if let Some(data) = self.cache.get(key).await {
            tx.send_replace(Some(Ok(data.clone())));
            return Ok(PreviewResponse {
                data,
                cache_hit: true,
            });
        }

        let result = self.generate_preview(request, headers, cancel).await;

        match &result {
            Ok(data) => {
                if let Some(evicted) = self.cache.put(key.to_string(), data.clone()).await {
                    debug!(key = %evicted, "Evicted least recently used preview");
                }
            }
            Err(e) if e.is_cancelled() => {
                debug!(url = %request.source_url, "Preview request cancelled");
            }
            Err(e) => {
                warn!(url = %request.source_url, error = %e, "Preview generation failed");
            }
        }

        if !matches!(&result, Err(e) if e.is_cancelled()) {
            tx.send_replace(Some(result.clone()));
        }

        result.map(|data| PreviewResponse {
            data,
            cache_hit: false,
        })
    }

    /// Run the fetch and transform pipeline without touching the cache.
    pub async fn generate_preview(
        &self,
        request: &PreviewRequest,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Bytes, PreviewError> {
        let source = self
            .fetcher
            .fetch(&request.source_url, headers, cancel)
            .await?;

        let engine = self.engine.clone();
        let request = request.clone();
        let data = tokio::task::spawn_blocking(move || engine.process(&source, &request))
            .await
            .map_err(|e| PreviewError::Worker(e.to_string()))??;

        Ok(data)
    }

    /// Drop every cached preview. Idempotent.
    pub async fn clear(&self) {
        self.cache.clear().await;
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.len().await,
            capacity: self.cache.capacity(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Get a reference to the preview cache.
    pub fn cache(&self) -> &PreviewCache {
        &self.cache
    }
}

/// Wait until the leader publishes, or return `None` if it gave up.
async fn wait_for_leader(mut rx: watch::Receiver<SharedResult>) -> SharedResult {
    rx.wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|shared| (*shared).clone())
}

/// Removes a leader's in-flight entry on every exit path, including drop.
struct FlightGuard<'a> {
    in_flight: &'a InFlightMap,
    key: &'a str,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(self.key);
    }
}

// =============================================================================
// Tests
// =============================================================================
