//! HTTP request handlers for the image previewer.
//!
//! # Endpoints
//!
//! - `GET /{operation}/{width}/{height}/{*source}` - Serve a preview
//! - `GET /health` - Health check endpoint

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::{DEFAULT_CACHE_MAX_AGE, DEFAULT_MAX_DIMENSION};
use crate::error::{EncodeError, FetchError, PreviewError, RequestError, TransformError};
use crate::fetch::{forwardable_headers, Fetcher, DEFAULT_FETCH_TIMEOUT};
use crate::preview::{Operation, PreviewFormat, PreviewRequest, PreviewService};

/// Response header reporting whether the preview came from cache.
pub const CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-preview-cache-hit");

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the preview service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<F: Fetcher> {
    /// The preview service for processing preview requests
    pub preview_service: Arc<PreviewService<F>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Largest accepted width or height
    pub max_dimension: u32,

    /// Deadline for one preview request, fetch included
    pub timeout: Duration,
}

impl<F: Fetcher> AppState<F> {
    /// Create a new application state around a shared preview service.
    pub fn new(preview_service: Arc<PreviewService<F>>) -> Self {
        Self {
            preview_service,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            max_dimension: DEFAULT_MAX_DIMENSION,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<F: Fetcher> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            preview_service: Arc::clone(&self.preview_service),
            cache_max_age: self.cache_max_age,
            max_dimension: self.max_dimension,
            timeout: self.timeout,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for preview requests.
///
/// Extracted from: `/{operation}/{width}/{height}/{*source}`. Dimensions are
/// captured as strings so malformed values get a JSON error body.
#[derive(Debug, Deserialize)]
pub struct PreviewPathParams {
    /// Operation name (only `fill`)
    pub operation: String,

    /// Target width in pixels, 0 for unconstrained
    pub width: String,

    /// Target height in pixels, 0 for unconstrained
    pub height: String,

    /// Source image URL, with or without scheme
    pub source: String,
}

impl PreviewPathParams {
    /// Build a preview request.
    ///
    /// A source without a scheme is assumed to be `http://`. The inbound
    /// query string belongs to the source URL and is appended to it.
    pub fn to_request(
        &self,
        query: Option<&str>,
        max_dimension: u32,
    ) -> Result<PreviewRequest, RequestError> {
        let operation: Operation = self.operation.parse()?;
        let width = parse_dimension("width", &self.width, max_dimension)?;
        let height = parse_dimension("height", &self.height, max_dimension)?;
        let source_url = source_url(&self.source, query)?;

        let mut request = PreviewRequest::fill(source_url, width, height);
        request.operation = operation;
        Ok(request)
    }
}

fn parse_dimension(axis: &'static str, value: &str, max: u32) -> Result<u32, RequestError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RequestError::InvalidDimension {
            axis,
            value: value.to_string(),
        });
    }

    let parsed: u32 = value.parse().map_err(|_| RequestError::InvalidDimension {
        axis,
        value: value.to_string(),
    })?;

    if parsed > max {
        return Err(RequestError::DimensionTooLarge {
            axis,
            value: parsed,
            max,
        });
    }

    Ok(parsed)
}

fn source_url(source: &str, query: Option<&str>) -> Result<String, RequestError> {
    let source = source.trim_start_matches('/');
    if source.is_empty() {
        return Err(RequestError::InvalidSource("empty source URL".to_string()));
    }

    let lower = source.to_ascii_lowercase();
    let mut url = if lower.starts_with("http://") || lower.starts_with("https://") {
        source.to_string()
    } else {
        format!("http://{}", source)
    };

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }

    let parsed =
        url::Url::parse(&url).map_err(|e| RequestError::InvalidSource(format!("{}: {}", url, e)))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(RequestError::InvalidSource(format!("{}: missing host", url)));
    }

    Ok(url)
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "decode_error", "invalid_dimension")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Log by severity and build the JSON error response.
///
/// - 5xx errors are logged at ERROR level
/// - 4xx errors are logged at WARN level
fn error_response(status: StatusCode, error_type: &'static str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status.is_client_error() {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let error_response = ErrorResponse::with_status(error_type, message, status);
    (status, Json(error_response)).into_response()
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let error_type = match &self {
            RequestError::UnknownOperation(_) => "unknown_operation",
            RequestError::InvalidDimension { .. } => "invalid_dimension",
            RequestError::DimensionTooLarge { .. } => "dimension_too_large",
            RequestError::InvalidSource(_) => "invalid_source",
        };

        error_response(StatusCode::BAD_REQUEST, error_type, self.to_string())
    }
}

/// Convert PreviewError to HTTP response.
///
/// Every origin failure maps to 502, whatever status the origin sent.
impl IntoResponse for PreviewError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            PreviewError::Fetch(fetch_err) => match fetch_err {
                FetchError::InvalidUrl { .. } => (StatusCode::BAD_REQUEST, "invalid_source"),
                FetchError::Network(_) => (StatusCode::BAD_GATEWAY, "fetch_failed"),
                FetchError::Body(_) => (StatusCode::BAD_GATEWAY, "fetch_failed"),
                FetchError::TooLarge { .. } => (StatusCode::BAD_GATEWAY, "source_too_large"),
                FetchError::BadStatus { .. } => (StatusCode::BAD_GATEWAY, "bad_origin_status"),
                FetchError::Cancelled => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            },

            PreviewError::Transform(transform_err) => match transform_err {
                TransformError::Decode { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "decode_error")
                }
                TransformError::Encode(EncodeError::UnsupportedFormat { .. }) => {
                    (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format")
                }
                TransformError::Encode(EncodeError::Codec(_)) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "encode_error")
                }
                TransformError::Resize { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "resize_error"),
                TransformError::Thumbnail { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "thumbnail_error")
                }
            },

            PreviewError::Worker(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        error_response(status, error_type, self.to_string())
    }
}

/// Errors a preview handler can return.
#[derive(Debug)]
pub enum HandlerError {
    Request(RequestError),
    Preview(PreviewError),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Request(err) => err.into_response(),
            HandlerError::Preview(err) => err.into_response(),
        }
    }
}

impl From<RequestError> for HandlerError {
    fn from(err: RequestError) -> Self {
        HandlerError::Request(err)
    }
}

impl From<PreviewError> for HandlerError {
    fn from(err: PreviewError) -> Self {
        HandlerError::Preview(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle preview requests.
///
/// # Endpoint
///
/// `GET /{operation}/{width}/{height}/{*source}`
///
/// # Path Parameters
///
/// - `operation`: Must be `fill`
/// - `width`, `height`: Target box in pixels (0 = unconstrained)
/// - `source`: Image URL; `http://` is assumed when no scheme is given
///
/// The query string, if any, is passed through to the source URL. Request
/// headers other than hop-by-hop headers are forwarded to the origin.
///
/// # Response
///
/// - `200 OK`: Encoded preview in the source's format
/// - `400 Bad Request`: Unknown operation, bad dimension or source URL
/// - `415 Unsupported Media Type`: Source decodes but cannot be re-encoded
/// - `422 Unprocessable Entity`: Source is not a decodable image
/// - `502 Bad Gateway`: Origin unreachable, failing or oversized
/// - `504 Gateway Timeout`: Deadline passed before the source arrived
/// - `500 Internal Server Error`: Processing error
///
/// # Headers
///
/// - `Content-Type`: sniffed from the output bytes
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Preview-Cache-Hit: true|false`
pub async fn preview_handler<F: Fetcher + 'static>(
    State(state): State<AppState<F>>,
    Path(params): Path<PreviewPathParams>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let request = params.to_request(query.as_deref(), state.max_dimension)?;
    let forwarded = forwardable_headers(&headers);

    // Cancels the fetch if the client goes away and this future is dropped
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let deadline = {
        let cancel = cancel.clone();
        let timeout = state.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            cancel.cancel();
        })
    };

    let result = state
        .preview_service
        .get_with_headers(&request, &forwarded, &cancel)
        .await;
    deadline.abort();

    let response = result?;
    debug!(
        url = %request.source_url,
        width = request.width,
        height = request.height,
        bytes = response.data.len(),
        cache_hit = response.cache_hit,
        "Served preview"
    );

    let content_type = image::guess_format(&response.data)
        .ok()
        .and_then(PreviewFormat::from_image_format)
        .map(|format| format.mime_type())
        .unwrap_or("application/octet-stream");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", state.cache_max_age),
            ),
            (CACHE_HIT_HEADER, response.cache_hit.to_string()),
        ],
        Body::from(response.data),
    )
        .into_response())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
