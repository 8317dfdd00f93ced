//! Avatar image pipeline: validate, decode, constrained resize, re-encode.
//!
//! The pipeline only produces a candidate [`AvatarImage`]; committing it to
//! the canonical profile is the profile reconciler's job. A failure at any
//! step is terminal for the attempt and leaves the prior avatar untouched.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Limits, Rgb, RgbImage};
use thiserror::Error;
use tracing::debug;

use crate::config::EngineConfig;
use crate::types::{AvatarImage, ImageBlob};
use crate::validate::validate_image;

/// MIME type of every image the pipeline produces
pub const OUTPUT_MIME: &str = "image/jpeg";

/// Largest width or height the decoder accepts. A small compressed upload
/// can declare huge dimensions, so this is checked from the header.
pub const MAX_DECODE_DIMENSION: u32 = 8192;

/// Errors from [`process`], returned as values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageProcessingError {
    /// The upload failed validation; nothing was decoded
    #[error("{0}")]
    Rejected(String),

    #[error("decode failed")]
    DecodeFailed,

    #[error("encode failed")]
    EncodeFailed,
}

/// Pipeline settings bound once from configuration
#[derive(Debug, Clone, Copy)]
pub struct ImagePipeline {
    pub max_dimension: u32,
    pub quality: u8,
}

impl ImagePipeline {
    pub fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension,
            quality,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.avatar_max_dimension, config.avatar_quality)
    }

    pub fn process(&self, blob: &ImageBlob) -> Result<AvatarImage, ImageProcessingError> {
        process(blob, self.max_dimension, self.quality)
    }
}

/// Validate, decode, downscale so the longer side is at most
/// `max_dimension`, and re-encode as JPEG at `quality` (1..=100).
pub fn process(
    blob: &ImageBlob,
    max_dimension: u32,
    quality: u8,
) -> Result<AvatarImage, ImageProcessingError> {
    let check = validate_image(blob);
    if !check.valid {
        return Err(ImageProcessingError::Rejected(
            check.error.unwrap_or_else(|| "invalid image".to_string()),
        ));
    }

    let format = ImageFormat::from_mime_type(blob.mime_type.trim().to_ascii_lowercase())
        .ok_or(ImageProcessingError::DecodeFailed)?;
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_DIMENSION);
    limits.max_image_height = Some(MAX_DECODE_DIMENSION);
    let mut reader = ImageReader::with_format(Cursor::new(&blob.bytes), format);
    reader.limits(limits);
    let decoded = reader.decode().map_err(|err| {
        debug!(error = %err, "Avatar decode failed");
        ImageProcessingError::DecodeFailed
    })?;

    let (width, height) = (decoded.width(), decoded.height());
    let (target_w, target_h) = target_dimensions(width, height, max_dimension);
    let resized = if (target_w, target_h) == (width, height) {
        decoded
    } else {
        decoded.resize_exact(target_w, target_h, FilterType::Triangle)
    };
    debug!(width, height, target_w, target_h, "Resized avatar");

    let flattened = flatten_onto_white(&resized);
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality.clamp(1, 100))
        .encode_image(&flattened)
        .map_err(|_| ImageProcessingError::EncodeFailed)?;

    Ok(AvatarImage::from_encoded(OUTPUT_MIME, &encoded))
}

/// Target size preserving aspect ratio with the longer side equal to
/// `max_dimension`. Images already within bounds keep their size.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    let longer = width.max(height);
    if longer <= max_dimension || longer == 0 {
        return (width, height);
    }

    let scale = |side: u32| -> u32 {
        let scaled = (side as u64 * max_dimension as u64 + longer as u64 / 2) / longer as u64;
        (scaled as u32).max(1)
    };

    if width >= height {
        (max_dimension, scale(height))
    } else {
        (scale(width), max_dimension)
    }
}

/// JPEG has no alpha channel; composite transparent pixels onto white.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}
