//! In-memory LRU cache for encoded previews.
//!
//! Entries are keyed by [`PreviewRequest::fingerprint`](super::PreviewRequest::fingerprint)
//! and hold the encoded output bytes. The cache is bounded by entry count:
//! admitting a new key into a full cache evicts exactly one entry, the least
//! recently used one.
//!
//! A capacity of zero disables caching. Lookups always miss and inserts are
//! dropped.

use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

/// Default number of cached previews.
pub const DEFAULT_PREVIEW_CACHE_CAPACITY: usize = 100;

// =============================================================================
// Preview Cache
// =============================================================================

/// LRU cache for encoded previews with entry-count capacity.
///
/// The key map and recency list live inside one [`LruCache`] behind one
/// lock, so no reader can observe a key in one but not the other.
///
/// # Example
///
/// ```
/// use image_previewer::preview::PreviewCache;
/// use bytes::Bytes;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = PreviewCache::with_capacity(2);
///
///     cache.put("a".to_string(), Bytes::from_static(b"first")).await;
///     assert_eq!(cache.get("a").await, Some(Bytes::from_static(b"first")));
/// }
/// ```
pub struct PreviewCache {
    /// `None` when caching is disabled
    entries: Option<RwLock<LruCache<String, Bytes>>>,

    capacity: usize,
}

impl PreviewCache {
    /// Create a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PREVIEW_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `capacity` previews.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| RwLock::new(LruCache::new(cap))),
            capacity,
        }
    }

    /// Get a preview and mark it most recently used.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let entries = self.entries.as_ref()?;
        let mut entries = entries.write().await;
        entries.get(key).cloned()
    }

    /// Check for a key without touching recency order.
    pub async fn contains(&self, key: &str) -> bool {
        match &self.entries {
            Some(entries) => entries.read().await.contains(key),
            None => false,
        }
    }

    /// Insert a preview as most recently used.
    ///
    /// Returns the key evicted to make room, if any.
    pub async fn put(&self, key: String, data: Bytes) -> Option<String> {
        let entries = self.entries.as_ref()?;
        let mut entries = entries.write().await;

        if entries.contains(&key) {
            entries.put(key, data);
            return None;
        }

        // push() hands back the LRU entry when it had to make room
        entries.push(key, data).map(|(evicted, _)| evicted)
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.write().await.clear();
        }
    }

    /// Number of cached previews.
    pub async fn len(&self) -> usize {
        match &self.entries {
            Some(entries) => entries.read().await.len(),
            None => 0,
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Keys from most to least recently used.
    pub async fn keys(&self) -> Vec<String> {
        match &self.entries {
            Some(entries) => entries.read().await.iter().map(|(k, _)| k.clone()).collect(),
            None => Vec::new(),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `false` when constructed with capacity zero.
    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
