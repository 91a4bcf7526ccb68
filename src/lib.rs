//! # Image Previewer
//!
//! An on-demand image transformation proxy.
//!
//! Given a remote image URL and a target box, the previewer fetches the
//! source, scales and center-crops it to fill the box, re-encodes it in the
//! source's own format and serves the bytes. Results are kept in a bounded
//! in-memory LRU cache so repeated requests skip the fetch and the re-encode.
//!
//! ## Features
//!
//! - **Fill-to-box previews**: Lanczos3 scaling plus center crop to the exact size
//! - **Format preserving**: JPEG, PNG and WebP sources come back in the same format
//! - **LRU caching**: Entry-bounded cache keyed by a request fingerprint
//! - **Singleflight**: Concurrent misses for one preview share a single fetch
//! - **Cancellation**: Client disconnects and deadlines abort in-flight fetches
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`preview`] - Request fingerprinting, LRU cache, transform engine and service
//! - [`fetch`] - Source image retrieval over HTTP
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types for every layer
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use image_previewer::{create_router, HttpFetcher, PreviewService, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let fetcher = HttpFetcher::new().expect("HTTP client");
//!     let service = Arc::new(PreviewService::with_cache_capacity(fetcher, 100));
//!     let router = create_router(service, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod preview;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use error::{EncodeError, FetchError, PreviewError, RequestError, TransformError};
pub use fetch::{Fetcher, HttpFetcher};
pub use preview::{
    CacheStats, Operation, PreviewCache, PreviewFormat, PreviewRequest, PreviewResponse,
    PreviewService, TransformEngine,
};
pub use server::{create_router, AppState, RouterConfig};
