//! JPEG encoding with a normalized quality knob.
//!
//! The search relies on one property of this encoder: for a fixed buffer,
//! the output length is non-decreasing as quality increases. That holds
//! for JPEG quantization in practice and is verified (within tolerance)
//! by the property tests below; the search's attempt cap is the safety
//! net if a codec ever violates it.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use image::ImageEncoder;
use std::io::Cursor;
use thiserror::Error;

use crate::decode::PixelBuffer;

/// Mime type of every payload this encoder produces.
pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// Errors that can occur during JPEG encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Quality is outside the normalized (0.0, 1.0] range.
    #[error("Invalid quality {0}: must be within (0.0, 1.0]")]
    InvalidQuality(f32),

    /// Width or height is zero.
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The backend codec rejected the buffer.
    #[error("JPEG encoding failed: {0}")]
    EncodingFailed(String),
}

/// Encode a pixel buffer to JPEG bytes.
///
/// # Arguments
///
/// * `buffer` - RGBA pixel buffer to encode
/// * `quality` - Normalized fidelity in (0.0, 1.0], where 1.0 is highest
///
/// # Returns
///
/// JPEG-encoded bytes on success. The function is pure: the same buffer
/// and quality always produce the same bytes.
///
/// # Errors
///
/// Returns `EncodeError::InvalidQuality` for non-finite or out-of-range
/// quality and `EncodeError::EncodingFailed` when the codec itself fails.
pub fn encode_jpeg(buffer: &PixelBuffer, quality: f32) -> Result<Vec<u8>, EncodeError> {
    if !quality.is_finite() || quality <= 0.0 || quality > 1.0 {
        return Err(EncodeError::InvalidQuality(quality));
    }
    if buffer.width() == 0 || buffer.height() == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: buffer.width(),
            height: buffer.height(),
        });
    }

    // JPEG carries no alpha channel
    let rgb = strip_alpha(buffer.pixels());

    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality));
    encoder
        .write_image(&rgb, buffer.width(), buffer.height(), ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(out.into_inner())
}

/// Map normalized (0.0, 1.0] quality onto the codec's 1-100 scale.
fn jpeg_quality(quality: f32) -> u8 {
    ((quality * 100.0).round() as u8).clamp(1, 100)
}

fn strip_alpha(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for generating image dimensions (keep small for speed).
    fn dimensions_strategy() -> impl Strategy<Value = (u32, u32)> {
        (1u32..=40, 1u32..=40)
    }

    /// Strategy for generating normalized quality values.
    fn quality_strategy() -> impl Strategy<Value = f32> {
        (1u32..=100).prop_map(|q| q as f32 / 100.0)
    }

    fn gradient_buffer(width: u32, height: u32) -> PixelBuffer {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x * 255) / width.max(1)) as u8);
                pixels.push(((y * 255) / height.max(1)) as u8);
                pixels.push((((x + y) * 127) / (width + height).max(1)) as u8);
                pixels.push(255);
            }
        }
        PixelBuffer::new(width, height, pixels)
    }

    proptest! {
        /// Property: Valid input always produces a well-formed JPEG.
        #[test]
        fn prop_valid_input_produces_valid_jpeg(
            (width, height) in dimensions_strategy(),
            quality in quality_strategy(),
        ) {
            let jpeg = encode_jpeg(&gradient_buffer(width, height), quality);
            prop_assert!(jpeg.is_ok());

            let jpeg = jpeg.unwrap();
            prop_assert!(jpeg.len() >= 4);
            prop_assert_eq!(&jpeg[0..2], &[0xFF, 0xD8], "Should have SOI marker");
            prop_assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9], "Should have EOI marker");
        }

        /// Property: Same input always produces the same output.
        #[test]
        fn prop_deterministic_output(
            (width, height) in (1u32..=20, 1u32..=20),
            quality in quality_strategy(),
        ) {
            let buffer = gradient_buffer(width, height);
            let first = encode_jpeg(&buffer, quality).unwrap();
            let second = encode_jpeg(&buffer, quality).unwrap();
            prop_assert_eq!(first, second);
        }

        /// Property: For a fixed buffer, output size is non-decreasing in
        /// quality, within a small tolerance for header noise.
        #[test]
        fn prop_size_monotone_in_quality(
            lower in 1u32..=50,
            gap in 1u32..=50,
        ) {
            let upper = (lower + gap).min(100);
            let buffer = gradient_buffer(32, 32);

            let low = encode_jpeg(&buffer, lower as f32 / 100.0).unwrap();
            let high = encode_jpeg(&buffer, upper as f32 / 100.0).unwrap();

            // Allow a small absolute tolerance; nearby quality levels can
            // share quantization tables and differ only in entropy noise
            prop_assert!(
                low.len() <= high.len() + 64,
                "size regressed: q{} -> {} bytes, q{} -> {} bytes",
                lower, low.len(), upper, high.len()
            );
        }

        /// Property: All normalized quality values encode successfully.
        #[test]
        fn prop_all_quality_values_work(quality in quality_strategy()) {
            let buffer = gradient_buffer(10, 10);
            prop_assert!(encode_jpeg(&buffer, quality).is_ok());
        }
    }
}
