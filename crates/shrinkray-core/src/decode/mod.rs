//! Image decoding for the compression engine.
//!
//! This module turns raw input bytes into an in-memory RGBA pixel buffer:
//! - Container sniffing (the declared mime type is advisory only)
//! - JPEG, PNG and WebP decoding
//! - EXIF orientation correction, baked into the pixel data
//!
//! Decoding knows nothing about budgets or encoding. A decode failure is
//! fatal for the whole compression run, since malformed input cannot
//! become valid by retrying.

mod raster;
mod types;

pub use raster::{decode, get_orientation};
pub use types::{DecodeError, Orientation, PixelBuffer, PixelFormat, SourceFormat};
