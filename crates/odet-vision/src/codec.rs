//! Base64 image transport codec.
//!
//! Converts between transport strings (raw base64 or `data:image/...;base64,`
//! URIs wrapping JPEG/PNG/etc.) and canonical BGR rasters.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};

use crate::error::{VisionError, VisionResult};
use crate::normalize::normalize_channels;
use crate::raster::Raster;

/// Container formats accepted by [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFormat {
    Jpeg,
    Png,
    Bmp,
    Tiff,
}

impl TransportFormat {
    /// Name used in the `data:image/<name>` prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportFormat::Jpeg => "jpeg",
            TransportFormat::Png => "png",
            TransportFormat::Bmp => "bmp",
            TransportFormat::Tiff => "tiff",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            TransportFormat::Jpeg => ImageFormat::Jpeg,
            TransportFormat::Png => ImageFormat::Png,
            TransportFormat::Bmp => ImageFormat::Bmp,
            TransportFormat::Tiff => ImageFormat::Tiff,
        }
    }
}

impl FromStr for TransportFormat {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(TransportFormat::Jpeg),
            "png" => Ok(TransportFormat::Png),
            "bmp" => Ok(TransportFormat::Bmp),
            "tiff" | "tif" => Ok(TransportFormat::Tiff),
            other => Err(VisionError::encode(format!("unsupported format '{}'", other))),
        }
    }
}

impl fmt::Display for TransportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode a transport string into a canonical BGR raster.
pub fn decode(encoded: &str) -> VisionResult<Raster> {
    let payload = strip_data_uri(encoded)?;

    // Line-wrapped base64 is common from browsers and CLI tools
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(VisionError::decode("empty image payload"));
    }

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| VisionError::decode(format!("invalid base64 payload: {}", e)))?;

    decode_bytes(&bytes)
}

/// Decode container bytes (JPEG, PNG, ...) into a canonical BGR raster.
pub fn decode_bytes(bytes: &[u8]) -> VisionResult<Raster> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| VisionError::decode(format!("unrecognized image container: {}", e)))?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(VisionError::decode(format!(
            "image has zero-sized dimensions {}x{}",
            width, height
        )));
    }

    normalize_channels(from_dynamic(img)?)
}

/// Encode a raster as a `data:image/<format>;base64,` string.
pub fn encode(raster: &Raster, format: &str) -> VisionResult<String> {
    let format: TransportFormat = format.parse()?;

    let canonical = if raster.is_canonical() {
        raster.clone()
    } else {
        normalize_channels(raster.clone())?
    };
    let (width, height) = (canonical.width(), canonical.height());

    let rgb = RgbImage::from_raw(width, height, swap_red_blue(canonical.into_data(), 3))
        .ok_or_else(|| VisionError::internal("Failed to create image buffer"))?;

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut bytes), format.image_format())
        .map_err(|e| VisionError::encode(format!("{} serialization failed: {}", format, e)))?;

    Ok(format!(
        "data:image/{};base64,{}",
        format.as_str(),
        STANDARD.encode(&bytes)
    ))
}

/// Return the base64 payload, dropping a `data:...;base64,` prefix if present.
fn strip_data_uri(encoded: &str) -> VisionResult<&str> {
    let trimmed = encoded.trim();
    if !trimmed.starts_with("data:") {
        return Ok(trimmed);
    }

    trimmed
        .split_once(',')
        .map(|(_, payload)| payload)
        .ok_or_else(|| VisionError::decode("malformed data URI: missing ',' separator"))
}

/// Convert a decoded container image into a raster in its native channel count.
fn from_dynamic(img: DynamicImage) -> VisionResult<Raster> {
    let color = img.color();
    let (width, height) = img.dimensions();

    match (color.has_color(), color.has_alpha()) {
        (false, false) => Raster::new(width, height, 1, img.to_luma8().into_raw()),
        (_, true) => Raster::new(width, height, 4, swap_red_blue(img.to_rgba8().into_raw(), 4)),
        (true, false) => Raster::new(width, height, 3, swap_red_blue(img.to_rgb8().into_raw(), 3)),
    }
}

/// RGB(A) <-> BGR(A); the swap is its own inverse.
fn swap_red_blue(mut data: Vec<u8>, channels: usize) -> Vec<u8> {
    for px in data.chunks_exact_mut(channels) {
        px.swap(0, 2);
    }
    data
}
