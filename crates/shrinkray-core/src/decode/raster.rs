//! Raster decoding with content sniffing and EXIF orientation handling.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::DynamicImage;
use image::ImageReader;
use log::warn;

use super::{DecodeError, Orientation, PixelBuffer, SourceFormat};

/// Decode raw image bytes into an RGBA pixel buffer.
///
/// The container format is sniffed from the bytes themselves; the declared
/// mime type is advisory only and never trusted for dispatch. EXIF
/// orientation is applied before returning, so the buffer's geometry is
/// display geometry.
///
/// # Arguments
///
/// * `bytes` - Raw image file bytes (JPEG, PNG or WebP)
/// * `declared_mime` - Optional caller-supplied mime type, used only to
///   report a mismatch against the sniffed format
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` when the bytes are not one of the
/// supported formats, `DecodeError::CorruptedFile` when decoding fails
/// partway, and `DecodeError::EmptyImage` for zero-dimension results.
pub fn decode(bytes: &[u8], declared_mime: Option<&str>) -> Result<PixelBuffer, DecodeError> {
    let sniffed = SourceFormat::sniff(bytes).ok_or(DecodeError::InvalidFormat)?;
    if let Some(declared) = declared_mime {
        if !declared.eq_ignore_ascii_case(sniffed.mime_type()) {
            warn!(
                "declared mime type {declared} does not match content ({}); decoding as sniffed",
                sniffed.mime_type()
            );
        }
    }

    // Extract EXIF orientation before decoding
    let orientation = extract_orientation(bytes);

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let oriented = apply_orientation(img, orientation);
    let buffer = PixelBuffer::from_rgba_image(oriented.into_rgba8());
    if buffer.is_empty() {
        return Err(DecodeError::EmptyImage);
    }
    Ok(buffer)
}

/// Extract the EXIF orientation value from raw image bytes.
///
/// Returns `Orientation::Normal` when no EXIF data is present or the
/// orientation cannot be determined.
pub fn get_orientation(bytes: &[u8]) -> Orientation {
    extract_orientation(bytes)
}

fn extract_orientation(bytes: &[u8]) -> Orientation {
    let exif_reader = Reader::new();
    let mut cursor = Cursor::new(bytes);

    match exif_reader.read_from_container(&mut cursor) {
        Ok(exif) => {
            if let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) {
                if let Some(value) = field.value.get_uint(0) {
                    return Orientation::from(value);
                }
            }
            Orientation::Normal
        }
        Err(_) => Orientation::Normal,
    }
}

/// Apply an EXIF orientation transformation to a decoded image.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode_jpeg;

    fn gradient_buffer(width: u32, height: u32) -> PixelBuffer {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x * 255) / width.max(1)) as u8);
                pixels.push(((y * 255) / height.max(1)) as u8);
                pixels.push(128);
                pixels.push(255);
            }
        }
        PixelBuffer::new(width, height, pixels)
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([60, 120, 180, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_jpeg_round_trip() {
        let jpeg = encode_jpeg(&gradient_buffer(32, 24), 0.9).unwrap();
        let decoded = decode(&jpeg, Some("image/jpeg")).unwrap();

        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 24);
        assert_eq!(decoded.byte_size(), 32 * 24 * 4);
    }

    #[test]
    fn test_decode_png() {
        let bytes = png_bytes(8, 6);
        let decoded = decode(&bytes, None).unwrap();

        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.height(), 6);
        // PNG decodes losslessly, so the pixel values survive exactly
        assert_eq!(&decoded.pixels()[..4], &[60, 120, 180, 255]);
    }

    #[test]
    fn test_declared_mime_is_advisory() {
        // PNG bytes mislabeled as JPEG still decode via the sniffed format
        let bytes = png_bytes(4, 4);
        let decoded = decode(&bytes, Some("image/jpeg")).unwrap();
        assert_eq!(decoded.width(), 4);
    }

    #[test]
    fn test_decode_garbage_is_invalid_format() {
        let result = decode(&[0x00, 0x01, 0x02, 0x03], Some("image/png"));
        assert!(matches!(result, Err(DecodeError::InvalidFormat)));
    }

    #[test]
    fn test_decode_empty_bytes() {
        let result = decode(&[], None);
        assert!(matches!(result, Err(DecodeError::InvalidFormat)));
    }

    #[test]
    fn test_decode_truncated_jpeg_is_corrupted() {
        let jpeg = encode_jpeg(&gradient_buffer(32, 24), 0.9).unwrap();
        // Keep the magic bytes so sniffing succeeds, then cut the stream short
        let result = decode(&jpeg[..20], None);
        assert!(matches!(result, Err(DecodeError::CorruptedFile(_))));
    }

    #[test]
    fn test_orientation_of_exif_less_image() {
        let jpeg = encode_jpeg(&gradient_buffer(8, 8), 0.9).unwrap();
        assert_eq!(get_orientation(&jpeg), Orientation::Normal);
        assert_eq!(get_orientation(&[0x00, 0x01, 0x02]), Orientation::Normal);
    }

    #[test]
    fn test_apply_orientation_rotate90_swaps_dimensions() {
        let img = image::RgbaImage::from_pixel(2, 1, image::Rgba([255, 0, 0, 255]));
        let rotated = apply_orientation(DynamicImage::ImageRgba8(img), Orientation::Rotate90CW);
        assert_eq!(rotated.into_rgba8().dimensions(), (1, 2));
    }

    #[test]
    fn test_apply_orientation_rotate180_reverses_pixels() {
        let mut img = image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([0, 255, 0, 255]));

        let result = apply_orientation(DynamicImage::ImageRgba8(img), Orientation::Rotate180);
        let rgba = result.into_rgba8();
        assert_eq!(rgba.get_pixel(0, 0).0, [0, 255, 0, 255]);
        assert_eq!(rgba.get_pixel(1, 0).0, [255, 0, 0, 255]);
    }
}
