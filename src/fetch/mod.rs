//! Source image retrieval.
//!
//! The preview service talks to origins only through the [`Fetcher`] trait,
//! so tests can substitute an in-memory source for [`HttpFetcher`].

mod fetcher;
mod http_fetcher;

pub use fetcher::{forwardable_headers, Fetcher};
pub use http_fetcher::{HttpFetcher, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_SOURCE_SIZE};
