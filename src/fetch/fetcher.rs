//! The [`Fetcher`] trait and header forwarding rules.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

/// Trait for retrieving the raw bytes of a source image.
///
/// Implementations must honor `cancel`: once it fires, the fetch returns
/// [`FetchError::Cancelled`] promptly and without a partial result.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full body at `url`.
    ///
    /// `headers` are client headers to pass on to the origin; they have
    /// already been filtered with [`forwardable_headers`].
    async fn fetch(
        &self,
        url: &str,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError>;
}

/// Headers that describe the client-to-proxy hop and must not be forwarded.
///
/// `Accept-Encoding` is dropped too: source bodies are decoded as-is.
const HOP_BY_HOP: [HeaderName; 10] = [
    header::ACCEPT_ENCODING,
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

/// Copy the client headers that are safe to send on to an origin.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if HOP_BY_HOP.contains(name) || name.as_str() == "keep-alive" {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}
