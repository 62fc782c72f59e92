//! In-memory pixel grids and scale bookkeeping.

use crate::error::{VisionError, VisionResult};

/// Channel count of the canonical layout (BGR).
pub const CANONICAL_CHANNELS: u8 = 3;

/// Row-major interleaved 8-bit pixel grid.
///
/// Three channels are BGR (the canonical order the detector expects),
/// four are BGRA and one is grayscale. Only 3-channel rasters leave
/// [`crate::normalize::normalize_channels`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Raster {
    /// Wrap raw interleaved pixel data.
    ///
    /// Fails on zero dimensions, zero channels, or a buffer whose length
    /// does not match `width * height * channels`.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> VisionResult<Self> {
        if width == 0 || height == 0 {
            return Err(VisionError::invalid_argument(format!(
                "Raster dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if channels == 0 {
            return Err(VisionError::invalid_argument("Raster must have at least one channel"));
        }

        let expected_len = width as usize * height as usize * channels as usize;
        if data.len() != expected_len {
            return Err(VisionError::invalid_argument(format!(
                "Invalid raster data length: expected {}, got {}",
                expected_len,
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Canonical BGR raster with every pixel set to `bgr`.
    pub fn solid(width: u32, height: u32, bgr: [u8; 3]) -> VisionResult<Self> {
        let pixels = width as usize * height as usize;
        let data = bgr.iter().copied().cycle().take(pixels * 3).collect();
        Self::new(width, height, CANONICAL_CHANNELS, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Whether the raster is in the canonical 3-channel layout.
    pub fn is_canonical(&self) -> bool {
        self.channels == CANONICAL_CHANNELS
    }

    /// Channel values of one pixel, or `None` outside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        self.data.get(start..start + c)
    }
}

/// Maps coordinates in a downscaled raster back to the original raster.
///
/// `original = scaled * scale_factor`. Created by
/// [`crate::normalize::bounded_downscale`] and consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleContext {
    scale_factor: f32,
    original_width: u32,
    original_height: u32,
}

impl ScaleContext {
    /// No resize happened.
    pub fn identity(original_width: u32, original_height: u32) -> Self {
        Self {
            scale_factor: 1.0,
            original_width,
            original_height,
        }
    }

    pub(crate) fn new(scale_factor: f32, original_width: u32, original_height: u32) -> Self {
        Self {
            scale_factor,
            original_width,
            original_height,
        }
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    pub fn original_width(&self) -> u32 {
        self.original_width
    }

    pub fn original_height(&self) -> u32 {
        self.original_height
    }

    /// Map a point from the scaled space to the original space.
    ///
    /// The result is clamped to the original raster, since a height rounded
    /// up to one pixel can overshoot it for extreme aspect ratios.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x * self.scale_factor).clamp(0.0, self.original_width as f32),
            (y * self.scale_factor).clamp(0.0, self.original_height as f32),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_length() {
        assert!(Raster::new(2, 2, 3, vec![0; 12]).is_ok());
        assert!(Raster::new(2, 2, 3, vec![0; 11]).is_err());
    }

    #[test]
    fn test_new_rejects_zero_dimensions() {
        assert!(matches!(
            Raster::new(0, 2, 3, vec![]),
            Err(VisionError::InvalidArgument(_))
        ));
        assert!(Raster::new(2, 2, 0, vec![]).is_err());
    }

    #[test]
    fn test_solid_and_pixel() {
        let raster = Raster::solid(3, 2, [1, 2, 3]).unwrap();
        assert!(raster.is_canonical());
        assert_eq!(raster.data().len(), 18);
        assert_eq!(raster.pixel(2, 1), Some(&[1u8, 2, 3][..]));
        assert_eq!(raster.pixel(3, 0), None);
    }

    #[test]
    fn test_scale_context() {
        let ctx = ScaleContext::identity(640, 480);
        assert_eq!(ctx.scale_factor(), 1.0);
        assert_eq!(ctx.to_original(10.0, 20.0), (10.0, 20.0));

        let ctx = ScaleContext::new(2.0, 1280, 720);
        assert_eq!(ctx.to_original(100.0, 50.0), (200.0, 100.0));
        assert_eq!(ctx.original_width(), 1280);
        assert_eq!(ctx.original_height(), 720);
    }

    #[test]
    fn test_to_original_clamps_to_original_bounds() {
        // 4000x3 squeezed to 640 wide keeps one row, so factor 6.25 overshoots
        let ctx = ScaleContext::new(6.25, 4000, 3);
        assert_eq!(ctx.to_original(640.0, 1.0), (4000.0, 3.0));
        assert_eq!(ctx.to_original(-2.0, 0.0), (0.0, 0.0));
    }
}
