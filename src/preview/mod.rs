//! Preview pipeline.
//!
//! This module turns a [`PreviewRequest`] into encoded preview bytes, caching
//! the result so repeated requests skip the fetch and the re-encode.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │  PreviewRequest
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             Preview Service             │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ PreviewCache │  │ TransformEngine │  │
//! │  │  (encoded    │  │  (decode →      │  │
//! │  │   previews)  │  │   fill → encode)│  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                 Fetcher                 │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`PreviewService`]: Main entry point, collapses concurrent misses per key
//! - [`PreviewCache`]: Entry-bounded LRU cache of encoded previews
//! - [`PreviewRequest`]: Request descriptor and its cache fingerprint
//! - [`TransformEngine`]: Decode, scale, center-crop and re-encode
//!
//! # Example
//!
//! ```
//! use image_previewer::preview::{PreviewCache, PreviewRequest};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = PreviewCache::with_capacity(10);
//!     let request = PreviewRequest::fill("http://example.com/cat.jpg", 300, 200);
//!     let key = request.fingerprint();
//!
//!     if cache.get(&key).await.is_none() {
//!         let preview = Bytes::from(vec![/* encoded bytes */]);
//!         cache.put(key, preview).await;
//!     }
//! }
//! ```

mod cache;
mod request;
mod service;
mod transform;

pub use cache::{PreviewCache, DEFAULT_PREVIEW_CACHE_CAPACITY};
pub use request::{Operation, PreviewFormat, PreviewRequest};
pub use service::{CacheStats, PreviewResponse, PreviewService};
pub use transform::{
    center_offset, compute_scale, cover_dimensions, scaled_dimensions, ExportParams,
    TransformEngine, JPEG_QUALITY, MAX_OUTPUT_DIMENSION, WEBP_QUALITY,
};
