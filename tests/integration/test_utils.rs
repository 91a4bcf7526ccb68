//! Test utilities for integration tests.
//!
//! This module provides a mock fetcher and helpers for synthesizing source
//! images in each supported container.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use image_previewer::error::FetchError;
use image_previewer::fetch::Fetcher;
use image_previewer::preview::PreviewService;
use image_previewer::{create_router, RouterConfig};

// =============================================================================
// Mock Fetcher with Request Tracking
// =============================================================================

/// An in-memory origin that records every fetch.
///
/// Unknown URLs answer with a 404 `BadStatus` error.
pub struct MockFetcher {
    images: HashMap<String, Bytes>,
    delay: Duration,
    fetch_count: AtomicUsize,
    urls: Mutex<Vec<String>>,
    headers: Mutex<Vec<HeaderMap>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            images: HashMap::new(),
            delay: Duration::ZERO,
            fetch_count: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            headers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_image(mut self, url: impl Into<String>, data: Vec<u8>) -> Self {
        self.images.insert(url.into(), Bytes::from(data));
        self
    }

    /// Delay every fetch, honoring cancellation while waiting.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn last_headers(&self) -> Option<HeaderMap> {
        self.headers.lock().last().cloned()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());
        self.headers.lock().push(headers.clone());

        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::BadStatus {
                status: 404,
                url: url.to_string(),
            })
    }
}

// =============================================================================
// Router Helpers
// =============================================================================

/// Build a router around a shared mock fetcher.
pub fn router_with(
    fetcher: Arc<MockFetcher>,
    capacity: usize,
    config: RouterConfig,
) -> (axum::Router, Arc<PreviewService<MockFetcher>>) {
    let service = Arc::new(PreviewService::with_shared_fetcher(fetcher, capacity));
    let router = create_router(Arc::clone(&service), config.with_tracing(false));
    (router, service)
}

// =============================================================================
// Image Builders
// =============================================================================

/// A smooth gradient so every codec produces a decodable, non-trivial image.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    }))
}

pub fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn create_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Jpeg)
}

pub fn create_png(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

pub fn create_webp(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::WebP)
}

/// GIF header only; the previewer rejects GIF from its signature.
pub fn create_gif(width: u16, height: u16) -> Vec<u8> {
    let mut data = b"GIF89a".to_vec();
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&[0; 3]);
    data
}

/// Little-endian TIFF header followed by an empty IFD.
pub fn create_tiff() -> Vec<u8> {
    let mut data = b"II*\0".to_vec();
    data.extend_from_slice(&8u32.to_le_bytes());
    data.extend_from_slice(&[0; 6]);
    data
}

/// Decode output bytes, returning the sniffed format and dimensions.
pub fn inspect(data: &[u8]) -> (ImageFormat, u32, u32) {
    let format = image::guess_format(data).unwrap();
    let img = image::load_from_memory(data).unwrap();
    (format, img.width(), img.height())
}
