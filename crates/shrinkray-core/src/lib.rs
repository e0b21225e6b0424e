//! Shrinkray Core - budget-bounded image re-encoding
//!
//! This crate provides the core compression engine for Shrinkray: given
//! arbitrary raster image bytes and a maximum byte budget, it produces a
//! re-encoded JPEG that satisfies the budget while keeping as much visual
//! fidelity as possible, via an iterative search over encoding quality and
//! pixel resolution.
//!
//! The engine is a library with no I/O of its own. The embedding
//! application supplies raw bytes and a budget and receives compressed
//! bytes plus metadata, or a typed error.

pub mod compress;
pub mod decode;
pub mod encode;
pub mod resample;
pub mod search;

pub use compress::{compress, compress_with_policy, CompressError, Compressed, EncodeSummary};
pub use decode::{decode, DecodeError, PixelBuffer, PixelFormat, SourceFormat};
pub use encode::{encode_jpeg, EncodeError, JPEG_MIME_TYPE};
pub use resample::{resample, shrink_dimensions, FilterType, ResampleError};
pub use search::{
    search, search_with_cancel, AttemptRecord, CancelToken, EncodeAttempt, Phase, SearchError,
    SearchOutcome,
};

use thiserror::Error;

/// Maximum allowed output size for one compression run, in bytes.
///
/// A budget of zero is representable but rejected by [`compress`] before
/// any decode or encode work happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Budget {
    /// Maximum output size in bytes.
    pub max_bytes: u64,
}

impl Budget {
    /// Create a budget of `max_bytes` bytes.
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Whether a payload of `len` bytes satisfies this budget.
    pub fn fits(&self, len: usize) -> bool {
        len as u64 <= self.max_bytes
    }
}

/// Errors for a [`CompressionPolicy`] that cannot drive a search.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A quality parameter is outside the normalized (0.0, 1.0] range.
    #[error("{name} must be within (0.0, 1.0], got {value}")]
    QualityOutOfRange { name: &'static str, value: f32 },

    /// The quality floor sits above a quality the search starts from.
    #[error(
        "quality floor ({floor}) must not exceed start ({start}) or reset ({reset}) quality"
    )]
    FloorAboveQuality { floor: f32, start: f32, reset: f32 },

    /// The quality step must be positive, or the descent cannot progress.
    #[error("quality step must be positive and finite, got {0}")]
    InvalidQualityStep(f32),

    /// Damping must be within (0.0, 1.0) to pull the shrink ratio under 1.
    #[error("shrink damping must be within (0.0, 1.0), got {0}")]
    InvalidDamping(f64),

    /// Floor dimensions of zero would request degenerate resamples.
    #[error("floor dimensions must be non-zero, got {width}x{height}")]
    ZeroFloorDimension { width: u32, height: u32 },

    /// An attempt cap of zero would forbid even the first encode.
    #[error("attempt cap must be at least 1")]
    ZeroAttemptCap,
}

/// Tuning parameters for the compression search.
///
/// All values the search treats as policy live here rather than as
/// module-level constants, so tests and callers can vary them. The
/// defaults mirror the production configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompressionPolicy {
    /// Quality of the very first encode attempt (0.0, 1.0].
    pub start_quality: f32,
    /// Amount subtracted from the quality on each descent step.
    pub quality_step: f32,
    /// Lowest quality the search will ever request.
    pub quality_floor: f32,
    /// Quality the search resets to after each resolution reduction.
    pub reset_quality: f32,
    /// Factor applied to the byte-ratio shrink estimate, within (0.0, 1.0).
    /// Compressed size does not scale linearly with pixel count, so the
    /// undamped estimate tends to overshoot and oscillate around the budget.
    pub shrink_damping: f64,
    /// Lowest width a resolution reduction may target.
    pub min_width: u32,
    /// Lowest height a resolution reduction may target.
    pub min_height: u32,
    /// Hard cap on encode attempts per run. Guarantees termination even
    /// against an encoder whose output size is not monotone in quality.
    pub max_attempts: u32,
    /// Interpolation filter used when reducing resolution.
    pub filter: FilterType,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            start_quality: 0.85,
            quality_step: 0.10,
            quality_floor: 0.35,
            reset_quality: 0.75,
            shrink_damping: 0.9,
            min_width: 400,
            min_height: 300,
            max_attempts: 32,
            filter: FilterType::Lanczos3,
        }
    }
}

impl CompressionPolicy {
    /// Create a policy with the default tuning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that the policy can drive a terminating search.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (name, value) in [
            ("start_quality", self.start_quality),
            ("reset_quality", self.reset_quality),
            ("quality_floor", self.quality_floor),
        ] {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(PolicyError::QualityOutOfRange { name, value });
            }
        }
        if self.quality_floor > self.start_quality || self.quality_floor > self.reset_quality {
            return Err(PolicyError::FloorAboveQuality {
                floor: self.quality_floor,
                start: self.start_quality,
                reset: self.reset_quality,
            });
        }
        if !self.quality_step.is_finite() || self.quality_step <= 0.0 {
            return Err(PolicyError::InvalidQualityStep(self.quality_step));
        }
        if !self.shrink_damping.is_finite()
            || self.shrink_damping <= 0.0
            || self.shrink_damping >= 1.0
        {
            return Err(PolicyError::InvalidDamping(self.shrink_damping));
        }
        if self.min_width == 0 || self.min_height == 0 {
            return Err(PolicyError::ZeroFloorDimension {
                width: self.min_width,
                height: self.min_height,
            });
        }
        if self.max_attempts == 0 {
            return Err(PolicyError::ZeroAttemptCap);
        }
        Ok(())
    }
}
