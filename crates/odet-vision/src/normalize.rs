//! Channel layout normalization and bounded downscaling.

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};
use tracing::debug;

use crate::error::{VisionError, VisionResult};
use crate::raster::{Raster, ScaleContext, CANONICAL_CHANNELS};

/// Bring a raster into the canonical 3-channel BGR layout.
///
/// - 3 channels pass through unchanged
/// - 4 channels (BGRA) drop alpha
/// - 1 channel (gray) is replicated into B, G and R
pub fn normalize_channels(raster: Raster) -> VisionResult<Raster> {
    let (width, height, channels) = (raster.width(), raster.height(), raster.channels());

    match channels {
        3 => Ok(raster),
        4 => {
            let data = raster
                .data()
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            Raster::new(width, height, CANONICAL_CHANNELS, data)
        }
        1 => {
            let data = raster.data().iter().flat_map(|&v| [v, v, v]).collect();
            Raster::new(width, height, CANONICAL_CHANNELS, data)
        }
        other => Err(VisionError::unsupported_format(format!(
            "Cannot normalize raster with {} channels",
            other
        ))),
    }
}

/// Shrink a raster so its width is at most `max_width`, keeping aspect ratio.
///
/// Rasters already narrow enough are returned borrowed with an identity
/// [`ScaleContext`]. Otherwise the height is rounded with the same factor
/// and the context carries `width / max_width` so boxes found in the
/// smaller raster can be mapped back. Never upscales.
pub fn bounded_downscale(
    raster: &Raster,
    max_width: u32,
) -> VisionResult<(Cow<'_, Raster>, ScaleContext)> {
    if max_width == 0 {
        return Err(VisionError::invalid_argument("max_width must be greater than zero"));
    }

    let (width, height) = (raster.width(), raster.height());
    if width <= max_width {
        return Ok((Cow::Borrowed(raster), ScaleContext::identity(width, height)));
    }

    let factor = max_width as f64 / width as f64;
    let new_height = ((height as f64 * factor).round() as u32).max(1);

    let canonical = if raster.is_canonical() {
        Cow::Borrowed(raster)
    } else {
        Cow::Owned(normalize_channels(raster.clone())?)
    };

    // Resampling is channel-order agnostic, so BGR data rides in an Rgb buffer.
    let buffer: ImageBuffer<Rgb<u8>, &[u8]> =
        ImageBuffer::from_raw(width, height, canonical.data())
            .ok_or_else(|| VisionError::internal("Failed to create image buffer"))?;
    let resized = imageops::resize(&buffer, max_width, new_height, FilterType::Triangle);

    let scale = ScaleContext::new(width as f32 / max_width as f32, width, height);
    debug!(
        from_width = width,
        from_height = height,
        to_width = max_width,
        to_height = new_height,
        scale_factor = scale.scale_factor(),
        "Downscaled raster"
    );

    let scaled = Raster::new(max_width, new_height, CANONICAL_CHANNELS, resized.into_raw())?;
    Ok((Cow::Owned(scaled), scale))
}
