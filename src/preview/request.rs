//! Preview request descriptor and cache fingerprinting.
//!
//! A [`PreviewRequest`] identifies one transformation: which image, what box
//! to fill, and with which operation. Its [`fingerprint`](PreviewRequest::fingerprint)
//! is the cache key.
//!
//! # Fingerprint Layout
//!
//! ```text
//! {url_len}:{url}|{width}|{height}|{format}|{operation}
//! ```
//!
//! The URL is length-prefixed, so a `|` inside the URL can never be confused
//! with a field boundary. All remaining fields are numbers or fixed tokens.

use std::fmt;
use std::str::FromStr;

use crate::error::RequestError;

// =============================================================================
// Format
// =============================================================================

/// Container formats the previewer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewFormat {
    Jpeg,
    Png,
    Webp,
}

impl PreviewFormat {
    /// Infer the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(PreviewFormat::Jpeg),
            "png" => Some(PreviewFormat::Png),
            "webp" => Some(PreviewFormat::Webp),
            _ => None,
        }
    }

    /// Infer the format from the last path segment of a URL.
    pub fn from_url_path(path: &str) -> Option<Self> {
        let file = path.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Map a codec-detected format onto a preview format.
    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(PreviewFormat::Jpeg),
            image::ImageFormat::Png => Some(PreviewFormat::Png),
            image::ImageFormat::WebP => Some(PreviewFormat::Webp),
            _ => None,
        }
    }

    /// Short token used in fingerprints and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviewFormat::Jpeg => "jpeg",
            PreviewFormat::Png => "png",
            PreviewFormat::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            PreviewFormat::Jpeg => "image/jpeg",
            PreviewFormat::Png => "image/png",
            PreviewFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for PreviewFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Operation
// =============================================================================

/// Transformation applied to the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operation {
    /// Scale to the target box, then center-crop to it exactly.
    #[default]
    Fill,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Fill => "fill",
        }
    }
}

impl FromStr for Operation {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fill" => Ok(Operation::Fill),
            other => Err(RequestError::UnknownOperation(other.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Preview Request
// =============================================================================

/// Immutable descriptor of one preview request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewRequest {
    /// Absolute http(s) URL of the source image
    pub source_url: String,

    /// Target width in pixels (0 = unconstrained)
    pub width: u32,

    /// Target height in pixels (0 = unconstrained)
    pub height: u32,

    /// Format inferred from the source URL, if recognizable.
    ///
    /// Informational only: output is always encoded in the format detected
    /// from the fetched bytes.
    pub format: Option<PreviewFormat>,

    /// Operation to apply
    pub operation: Operation,
}

impl PreviewRequest {
    /// Create a fill request, inferring the format from the URL's extension.
    pub fn fill(source_url: impl Into<String>, width: u32, height: u32) -> Self {
        let source_url = source_url.into();
        let format = url::Url::parse(&source_url)
            .ok()
            .and_then(|u| PreviewFormat::from_url_path(u.path()));
        Self {
            source_url,
            width,
            height,
            format,
            operation: Operation::Fill,
        }
    }

    /// Override the recorded format.
    pub fn with_format(mut self, format: Option<PreviewFormat>) -> Self {
        self.format = format;
        self
    }

    /// Build the cache key for this request.
    pub fn fingerprint(&self) -> String {
        let format = self.format.map(|f| f.as_str()).unwrap_or("none");
        format!(
            "{}:{}|{}|{}|{}|{}",
            self.source_url.len(),
            self.source_url,
            self.width,
            self.height,
            format,
            self.operation
        )
    }

    /// Returns `true` if both target dimensions are set, which triggers cropping.
    pub fn is_boxed(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

// =============================================================================
// Tests
// =============================================================================
