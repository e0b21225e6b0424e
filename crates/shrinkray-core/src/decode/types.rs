//! Core types for image decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not a recognized, supported raster format.
    #[error("Unrecognized or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// The image decoded to zero width or height.
    #[error("Image has zero width or height")]
    EmptyImage,
}

/// Sample layout of a [`PixelBuffer`]. The engine works in RGBA8
/// throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit red, green, blue, alpha. Four bytes per pixel.
    #[default]
    Rgba8,
}

impl PixelFormat {
    /// Number of bytes per pixel for this format.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Container formats the engine accepts as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
}

impl SourceFormat {
    /// The mime type for this container format.
    pub fn mime_type(self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "image/jpeg",
            SourceFormat::Png => "image/png",
            SourceFormat::WebP => "image/webp",
        }
    }

    /// Detect the container format from the leading bytes of `data`.
    ///
    /// Returns `None` when the bytes are not recognizable as one of the
    /// supported formats.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match image::guess_format(data).ok()? {
            image::ImageFormat::Jpeg => Some(SourceFormat::Jpeg),
            image::ImageFormat::Png => Some(SourceFormat::Png),
            image::ImageFormat::WebP => Some(SourceFormat::WebP),
            _ => None,
        }
    }
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (flip horizontal + rotate 270 CW).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (flip horizontal + rotate 90 CW).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (90 CCW).
    Rotate270CW = 8,
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            1 => Orientation::Normal,
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// A decoded image with RGBA pixel data.
///
/// Invariant: `pixels.len() == width * height * 4`. Buffers are never
/// mutated after construction; the search moves them between steps so
/// at most two generations are alive at a time.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Create a new PixelBuffer from RGBA pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        let format = PixelFormat::Rgba8;
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * format.channels(),
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            format,
            pixels,
        }
    }

    /// Create a PixelBuffer from an image::RgbaImage.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    /// Convert into an image::RgbaImage for further processing.
    pub fn into_rgba_image(self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels)
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sample layout of the pixel data.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel data in row-major order.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Size of the pixel data in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Whether this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_buffer_creation() {
        let pixels = vec![0u8; 100 * 50 * 4];
        let buf = PixelBuffer::new(100, 50, pixels);

        assert_eq!(buf.width(), 100);
        assert_eq!(buf.height(), 50);
        assert_eq!(buf.format(), PixelFormat::Rgba8);
        assert_eq!(buf.pixel_count(), 5000);
        assert_eq!(buf.byte_size(), 20000);
        assert!(!buf.is_empty());
    }

    #[test]
    fn test_pixel_buffer_empty() {
        let buf = PixelBuffer::new(0, 0, vec![]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_pixel_buffer_image_round_trip() {
        let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        let buf = PixelBuffer::from_rgba_image(img);
        assert_eq!(buf.width(), 4);
        assert_eq!(buf.height(), 2);

        let back = buf.into_rgba_image().unwrap();
        assert_eq!(back.dimensions(), (4, 2));
        assert_eq!(back.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_source_format_mime_types() {
        assert_eq!(SourceFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(SourceFormat::Png.mime_type(), "image/png");
        assert_eq!(SourceFormat::WebP.mime_type(), "image/webp");
    }

    #[test]
    fn test_source_format_sniff_png() {
        let mut bytes = Vec::new();
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255]));
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        assert_eq!(SourceFormat::sniff(&bytes), Some(SourceFormat::Png));
    }

    #[test]
    fn test_source_format_sniff_garbage() {
        assert_eq!(SourceFormat::sniff(&[0x00, 0x01, 0x02, 0x03]), None);
        assert_eq!(SourceFormat::sniff(&[]), None);
    }

    #[test]
    fn test_orientation_from_u32() {
        assert_eq!(Orientation::from(1), Orientation::Normal);
        assert_eq!(Orientation::from(6), Orientation::Rotate90CW);
        assert_eq!(Orientation::from(99), Orientation::Normal); // Invalid defaults to Normal
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::CorruptedFile("bad scan".to_string());
        assert_eq!(err.to_string(), "Corrupted or incomplete image file: bad scan");

        let err = DecodeError::InvalidFormat;
        assert_eq!(err.to_string(), "Unrecognized or unsupported image format");
    }
}
