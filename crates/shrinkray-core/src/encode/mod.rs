//! Image encoding for the compression engine.
//!
//! Re-encoding always targets JPEG, regardless of the input format, so
//! downstream consumers only ever see one output mime type. The quality
//! knob is normalized to (0.0, 1.0]; the mapping onto the codec's own
//! parameter scale is an implementation detail of this module.

mod jpeg;

pub use jpeg::{encode_jpeg, EncodeError, JPEG_MIME_TYPE};
