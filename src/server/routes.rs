//! Router configuration for the image previewer.
//!
//! # Route Structure
//!
//! ```text
//! /health                                  - Health check
//! /{operation}/{width}/{height}/{*source}  - Preview endpoint
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use image_previewer::fetch::HttpFetcher;
//! use image_previewer::preview::PreviewService;
//! use image_previewer::server::{create_router, RouterConfig};
//!
//! let service = Arc::new(PreviewService::new(HttpFetcher::new()?));
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(service, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, preview_handler, AppState};
use crate::config::{
    DEFAULT_CACHE_MAX_AGE, DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_DIMENSION, DEFAULT_TIMEOUT_SECS,
};
use crate::fetch::Fetcher;
use crate::preview::PreviewService;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Maximum inbound request body size in bytes
    pub max_body_size: usize,

    /// Deadline for one preview request
    pub timeout: Duration,

    /// Largest accepted width or height
    pub max_dimension: u32,
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    /// - Request bodies are limited to 1MB
    /// - Requests time out after 10 seconds
    /// - Width and height are limited to 4096
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    /// Pass None (or don't call this method) to allow any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Health check and preview routes
/// - CORS configuration
/// - Request body limit
/// - Request tracing (optional)
///
/// The service is shared so the caller can still reach it, e.g. to clear the
/// cache on shutdown.
pub fn create_router<F>(preview_service: Arc<PreviewService<F>>, config: RouterConfig) -> Router
where
    F: Fetcher + 'static,
{
    let app_state = AppState::new(preview_service)
        .with_cache_max_age(config.cache_max_age)
        .with_max_dimension(config.max_dimension)
        .with_timeout(config.timeout);

    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/{operation}/{width}/{height}/{*source}",
            get(preview_handler::<F>),
        )
        .with_state(app_state)
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
