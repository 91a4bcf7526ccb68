use thiserror::Error;

/// Errors that can occur while fetching a source image from its origin.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The source URL could not be parsed or uses an unsupported scheme
    #[error("Invalid source URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection, DNS, TLS or timeout failure while talking to the origin
    #[error("Network error: {0}")]
    Network(String),

    /// The origin answered with a non-success status code
    #[error("Origin returned status {status} for {url}")]
    BadStatus { status: u16, url: String },

    /// The response body could not be read to completion
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// The response body exceeded the configured source size limit
    #[error("Source image exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The caller cancelled the request before the fetch completed
    #[error("Fetch cancelled")]
    Cancelled,
}

/// Errors raised while encoding the transformed image.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// The detected source format has no configured encoder
    #[error("Unsupported output format: {format}")]
    UnsupportedFormat { format: String },

    /// The codec failed while producing output bytes
    #[error("Codec error: {0}")]
    Codec(String),
}

/// Errors raised by the transform pipeline.
///
/// Each variant names the pipeline stage that failed.
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// Source bytes are corrupt or in a container we cannot decode
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// Scaling could not be applied to the decoded image
    #[error("Failed to resize image: {message}")]
    Resize { message: String },

    /// Cropping to the target box failed
    #[error("Failed to crop image: {message}")]
    Thumbnail { message: String },

    /// Encoding the output failed
    #[error("Failed to encode image: {0}")]
    Encode(#[from] EncodeError),
}

/// Errors returned by the preview service.
#[derive(Debug, Clone, Error)]
pub enum PreviewError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    /// The blocking transform task panicked or was aborted
    #[error("Transform worker failed: {0}")]
    Worker(String),
}

impl PreviewError {
    /// Returns `true` if the error came from caller cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PreviewError::Fetch(FetchError::Cancelled))
    }
}

/// Errors produced while turning an inbound HTTP request into a preview request.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// Only the `fill` operation is supported
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// A width or height segment is not a non-negative integer
    #[error("Invalid {axis}: '{value}'")]
    InvalidDimension { axis: &'static str, value: String },

    /// A width or height exceeds the configured maximum
    #[error("{axis} {value} exceeds the maximum of {max}")]
    DimensionTooLarge {
        axis: &'static str,
        value: u32,
        max: u32,
    },

    /// The source URL segment is empty or not a valid http(s) URL
    #[error("Invalid source URL: {0}")]
    InvalidSource(String),
}
