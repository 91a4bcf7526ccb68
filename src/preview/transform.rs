//! Preview transform engine.
//!
//! Turns fetched source bytes into an encoded preview. Each call runs the
//! same four stages:
//!
//! ```text
//! decode ──► scale ──► crop to box ──► encode
//! ```
//!
//! # Scaling
//!
//! - Both target dimensions 0: scale is 1.0
//! - Both positive: `min(tw / sw, th / sh)`, aspect ratio preserved
//! - One positive: that target over the matching source dimension
//!
//! # Cropping
//!
//! Only applied when both target dimensions are positive. The scaled image is
//! center-cropped to exactly `tw × th`. When scaling left it short of the box
//! in one axis, it is first scaled up just enough to cover the box, so the
//! output always has the requested size.
//!
//! # Encoding
//!
//! Output is encoded in the format detected from the source bytes, never the
//! one recorded on the request. See [`ExportParams`] for per-format settings.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};

use crate::error::{EncodeError, TransformError};

use super::request::{PreviewFormat, PreviewRequest};

/// Largest width or height the engine will scale to (WebP's hard limit).
pub const MAX_OUTPUT_DIMENSION: u32 = 16383;

/// JPEG output quality.
pub const JPEG_QUALITY: u8 = 85;

/// WebP output quality (lossy).
pub const WEBP_QUALITY: f32 = 80.0;

const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

// =============================================================================
// Export Parameters
// =============================================================================

/// Fixed encoder settings, one variant per output format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportParams {
    /// Baseline JPEG; `optimize` builds per-image Huffman tables.
    Jpeg { quality: u8, optimize: bool },
    /// Default compression is zlib level 6; the encoder never interlaces.
    Png {
        compression: CompressionType,
        filter: PngFilterType,
    },
    /// Encoded with libwebp's default method (reduction effort) of 4.
    Webp { quality: f32, lossless: bool },
}

impl ExportParams {
    /// Settings used for a detected source format.
    pub fn for_format(format: PreviewFormat) -> Self {
        match format {
            PreviewFormat::Jpeg => ExportParams::Jpeg {
                quality: JPEG_QUALITY,
                optimize: true,
            },
            PreviewFormat::Png => ExportParams::Png {
                compression: CompressionType::Default,
                filter: PngFilterType::Adaptive,
            },
            PreviewFormat::Webp => ExportParams::Webp {
                quality: WEBP_QUALITY,
                lossless: false,
            },
        }
    }

    /// Encode an image with these settings.
    pub fn encode(&self, img: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
        let mut output = Vec::new();

        match *self {
            ExportParams::Jpeg { quality, optimize } => {
                // JPEG has no alpha channel
                let rgb = img.to_rgb8();
                let (width, height) = jpeg_dimensions(rgb.width(), rgb.height())?;

                let mut encoder = jpeg_encoder::Encoder::new(&mut output, quality);
                encoder.set_optimized_huffman_tables(optimize);
                encoder
                    .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
                    .map_err(|e| EncodeError::Codec(e.to_string()))?;
            }
            ExportParams::Png {
                compression,
                filter,
            } => {
                let encoder = PngEncoder::new_with_quality(&mut output, compression, filter);
                img.write_with_encoder(encoder)
                    .map_err(|e| EncodeError::Codec(e.to_string()))?;
            }
            ExportParams::Webp { quality, lossless } => {
                check_dimensions(img.width(), img.height()).map_err(EncodeError::Codec)?;

                let rgba = img.to_rgba8();
                let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());

                let memory = encoder
                    .encode_simple(lossless, quality)
                    .map_err(|e| EncodeError::Codec(format!("WebP encoding failed: {:?}", e)))?;
                output.extend_from_slice(&memory);
            }
        }

        Ok(output)
    }
}

fn jpeg_dimensions(width: u32, height: u32) -> Result<(u16, u16), EncodeError> {
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(EncodeError::Codec(format!(
            "{}x{} exceeds the JPEG size limit",
            width, height
        ))),
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// Uniform scale factor for a source image and target box.
pub fn compute_scale(src_width: u32, src_height: u32, width: u32, height: u32) -> f64 {
    let (sw, sh) = (f64::from(src_width), f64::from(src_height));

    match (width, height) {
        (0, 0) => 1.0,
        (w, 0) => f64::from(w) / sw,
        (0, h) => f64::from(h) / sh,
        (w, h) => f64::min(f64::from(w) / sw, f64::from(h) / sh),
    }
}

/// Dimensions after applying `scale` to both axes, at least 1x1.
pub fn scaled_dimensions(src_width: u32, src_height: u32, scale: f64) -> (u32, u32) {
    let w = (f64::from(src_width) * scale).round().max(1.0);
    let h = (f64::from(src_height) * scale).round().max(1.0);
    (w as u32, h as u32)
}

/// Smallest dimensions at least `width × height` that keep the source aspect ratio.
pub fn cover_dimensions(src_width: u32, src_height: u32, width: u32, height: u32) -> (u32, u32) {
    let cover = f64::max(
        f64::from(width) / f64::from(src_width),
        f64::from(height) / f64::from(src_height),
    );
    let w = (f64::from(src_width) * cover).round().max(f64::from(width));
    let h = (f64::from(src_height) * cover).round().max(f64::from(height));
    (w as u32, h as u32)
}

/// Top-left corner of a centered `width × height` window.
pub fn center_offset(src_width: u32, src_height: u32, width: u32, height: u32) -> (u32, u32) {
    (
        src_width.saturating_sub(width) / 2,
        src_height.saturating_sub(height) / 2,
    )
}

// =============================================================================
// Transform Engine
// =============================================================================

/// Stateless decode/scale/crop/encode pipeline.
///
/// Every call is independent; decoded pixel buffers are dropped when the call
/// returns, on success or failure.
///
/// # Example
///
/// ```ignore
/// use image_previewer::preview::{PreviewRequest, TransformEngine};
///
/// let engine = TransformEngine::new();
/// let request = PreviewRequest::fill("http://example.com/cat.jpg", 300, 200);
/// let preview = engine.process(&source_bytes, &request)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransformEngine {}

impl TransformEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// Run the full pipeline for one request.
    pub fn process(&self, source: &[u8], request: &PreviewRequest) -> Result<Bytes, TransformError> {
        let (format, img) = self.decode(source)?;

        let scale = compute_scale(img.width(), img.height(), request.width, request.height);
        let img = self.resize(img, scale)?;

        let img = if request.is_boxed() {
            self.thumbnail(img, request.width, request.height)?
        } else {
            img
        };

        let encoded = self.export(&img, format)?;
        Ok(Bytes::from(encoded))
    }

    /// Decode source bytes, sniffing the container from its magic bytes.
    ///
    /// A recognized container that cannot be re-encoded (GIF, TIFF, ...) is
    /// rejected with [`EncodeError::UnsupportedFormat`] before any pixels are
    /// decoded.
    pub fn decode(&self, source: &[u8]) -> Result<(PreviewFormat, DynamicImage), TransformError> {
        let reader = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| TransformError::Decode {
                message: e.to_string(),
            })?;

        let detected = reader.format().ok_or_else(|| TransformError::Decode {
            message: "unrecognized image container".to_string(),
        })?;

        let format = PreviewFormat::from_image_format(detected).ok_or_else(|| {
            EncodeError::UnsupportedFormat {
                format: format!("{:?}", detected).to_lowercase(),
            }
        })?;

        let img = reader.decode().map_err(|e| TransformError::Decode {
            message: e.to_string(),
        })?;

        Ok((format, img))
    }

    /// Scale both axes by `scale`.
    pub fn resize(&self, img: DynamicImage, scale: f64) -> Result<DynamicImage, TransformError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(TransformError::Resize {
                message: format!("invalid scale factor {}", scale),
            });
        }

        let (src_w, src_h) = img.dimensions();
        let (w, h) = scaled_dimensions(src_w, src_h, scale);
        if (w, h) == (src_w, src_h) {
            return Ok(img);
        }

        check_dimensions(w, h).map_err(|message| TransformError::Resize { message })?;

        Ok(img.resize_exact(w, h, RESAMPLE_FILTER))
    }

    /// Center-crop to exactly `width × height`, covering the box first if needed.
    pub fn thumbnail(
        &self,
        img: DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, TransformError> {
        if width == 0 || height == 0 {
            return Err(TransformError::Thumbnail {
                message: format!("empty crop box {}x{}", width, height),
            });
        }

        let (src_w, src_h) = img.dimensions();
        if (src_w, src_h) == (width, height) {
            return Ok(img);
        }

        let img = if src_w < width || src_h < height {
            let (w, h) = cover_dimensions(src_w, src_h, width, height);
            check_dimensions(w, h).map_err(|message| TransformError::Thumbnail { message })?;
            img.resize_exact(w, h, RESAMPLE_FILTER)
        } else {
            img
        };

        let (src_w, src_h) = img.dimensions();
        if src_w < width || src_h < height {
            return Err(TransformError::Thumbnail {
                message: format!(
                    "{}x{} image cannot cover {}x{} box",
                    src_w, src_h, width, height
                ),
            });
        }

        let (x, y) = center_offset(src_w, src_h, width, height);
        Ok(img.crop_imm(x, y, width, height))
    }

    /// Encode in the detected source format.
    pub fn export(&self, img: &DynamicImage, format: PreviewFormat) -> Result<Vec<u8>, EncodeError> {
        ExportParams::for_format(format).encode(img)
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), String> {
    if width > MAX_OUTPUT_DIMENSION || height > MAX_OUTPUT_DIMENSION {
        return Err(format!(
            "{}x{} exceeds the {} pixel limit",
            width, height, MAX_OUTPUT_DIMENSION
        ));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
