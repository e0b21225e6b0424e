//! Pixel buffer resampling and the resolution arithmetic for the search.
//!
//! [`resample`] performs exactly the resize it is asked for; deciding the
//! target shape is the caller's job. [`shrink_dimensions`] is that caller
//! logic: it turns a missed byte budget into the next resolution step,
//! clamped to the policy floor and never upscaling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::PixelBuffer;
use crate::{Budget, CompressionPolicy};

/// Error types for resampling operations.
///
/// An invalid dimension request indicates a bug in the calling search
/// logic, not a recoverable runtime condition.
#[derive(Debug, Error)]
pub enum ResampleError {
    /// Requested target dimensions include a zero.
    #[error("Invalid target dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The source buffer's pixel data does not match its dimensions.
    #[error("Invalid source buffer: {0}")]
    InvalidSource(String),
}

/// Interpolation filter for resampling operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality).
    #[default]
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Resample a pixel buffer to exact target dimensions.
///
/// Consumes the source buffer, so an abandoned resolution step is released
/// as soon as its replacement exists.
///
/// # Errors
///
/// Returns `ResampleError::InvalidDimensions` when either target dimension
/// is zero.
pub fn resample(
    buffer: PixelBuffer,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<PixelBuffer, ResampleError> {
    if width == 0 || height == 0 {
        return Err(ResampleError::InvalidDimensions { width, height });
    }

    // Fast path: nothing to do
    if buffer.width() == width && buffer.height() == height {
        return Ok(buffer);
    }

    let rgba = buffer
        .into_rgba_image()
        .ok_or_else(|| ResampleError::InvalidSource("pixel data does not match dimensions".to_string()))?;

    let resized = image::imageops::resize(&rgba, width, height, filter.to_image_filter());

    Ok(PixelBuffer::from_rgba_image(resized))
}

/// Compute the next resolution step after a missed budget.
///
/// The shrink ratio is `sqrt(budget / last_size)` damped by the policy
/// factor, applied to both dimensions so the aspect ratio is preserved
/// until a floor clips it. The result is clamped so it never drops below
/// the policy floor and never exceeds the current dimensions; a source
/// already smaller than the floor uses its own size as the floor.
///
/// Returning the current dimensions unchanged means the resolution is
/// pinned and the search has nowhere smaller to go.
pub fn shrink_dimensions(
    width: u32,
    height: u32,
    budget: Budget,
    last_size: u64,
    policy: &CompressionPolicy,
) -> (u32, u32) {
    if last_size == 0 || width == 0 || height == 0 {
        return (width, height);
    }

    let ratio = (budget.max_bytes as f64 / last_size as f64).sqrt() * policy.shrink_damping;

    let floor_w = policy.min_width.min(width).max(1);
    let floor_h = policy.min_height.min(height).max(1);

    let target_w = ((f64::from(width) * ratio).round() as u32).clamp(floor_w, width);
    let target_h = ((f64::from(height) * ratio).round() as u32).clamp(floor_h, height);

    (target_w, target_h)
}
