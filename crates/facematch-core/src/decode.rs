use base64::{engine::general_purpose, Engine as _};
use image::RgbImage;
use tracing::debug;

use crate::errors::{AppError, AppResult};

const MEDIA_TYPE_MARKER: &str = "base64,";

/// Caller-supplied image payload: base64 text, optionally behind a
/// `data:<media-type>;base64,` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// Encode raw image file bytes with the standard base64 alphabet.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(general_purpose::STANDARD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EncodedImage {
    fn from(payload: String) -> Self {
        Self(payload)
    }
}

impl From<&str> for EncodedImage {
    fn from(payload: &str) -> Self {
        Self(payload.to_string())
    }
}

/// Validated 8-bit, 3-channel color image.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage(RgbImage);

impl RasterImage {
    pub const CHANNELS: u8 = 3;

    pub fn from_rgb(image: RgbImage) -> AppResult<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(AppError::EmptyImage {
                width: image.width(),
                height: image.height(),
            });
        }
        Ok(Self(image))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn channels(&self) -> u8 {
        Self::CHANNELS
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.0
    }
}

pub fn decode(payload: &str) -> AppResult<RasterImage> {
    let body = strip_media_type(payload);
    let compact: String = body
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return Err(AppError::EmptyPayload);
    }

    let bytes = general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|source| AppError::InvalidEncoding { source })?;
    let image =
        image::load_from_memory(&bytes).map_err(|source| AppError::ImageDecode { source })?;
    let raster = RasterImage::from_rgb(image.to_rgb8())?;

    debug!(
        width = raster.width(),
        height = raster.height(),
        bytes = bytes.len(),
        "decoded image payload"
    );
    Ok(raster)
}

fn strip_media_type(payload: &str) -> &str {
    match payload.split_once(MEDIA_TYPE_MARKER) {
        Some((_, data)) => data.trim(),
        None => payload.trim(),
    }
}
