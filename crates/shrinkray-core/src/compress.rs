//! The public compression entry point.
//!
//! `compress` takes raw image bytes, an advisory mime type and a byte
//! budget, and returns bytes that satisfy the budget, or the smallest
//! achievable re-encode flagged as over budget, or a typed error. Inputs
//! already under budget are returned byte-identical, with no decode or
//! encode round trip, so no fidelity is lost when none needs to be.
//!
//! Each call is self-contained; nothing is shared between invocations and
//! concurrent calls need no locking.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::{decode, DecodeError, SourceFormat};
use crate::encode::{EncodeError, JPEG_MIME_TYPE};
use crate::resample::ResampleError;
use crate::search::{search_with_cancel, CancelToken, SearchError, SearchOutcome};
use crate::{Budget, CompressionPolicy, PolicyError};

/// Mime type reported for an untouched input whose format could not be
/// determined.
const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// Errors for a compression run.
#[derive(Debug, Error)]
pub enum CompressError {
    /// The budget was zero.
    #[error("Budget must be positive")]
    InvalidBudget,

    /// The supplied policy cannot drive a search.
    #[error("Invalid compression policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    /// The input bytes could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The encoder failed on a valid buffer.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The search issued an invalid resample request.
    #[error(transparent)]
    Resample(#[from] ResampleError),

    /// The caller cancelled the run.
    #[error("Compression cancelled by caller")]
    Cancelled,
}

impl From<SearchError> for CompressError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Encode(e) => CompressError::Encode(e),
            SearchError::Resample(e) => CompressError::Resample(e),
            SearchError::Cancelled => CompressError::Cancelled,
        }
    }
}

/// What the re-encode ended on, for callers that log or display it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodeSummary {
    /// Normalized quality of the returned payload.
    pub quality: f32,
    /// Width of the returned payload in pixels.
    pub width: u32,
    /// Height of the returned payload in pixels.
    pub height: u32,
    /// Number of encode attempts the search made.
    pub attempts: u32,
}

/// Result of a compression run.
#[derive(Debug, Clone)]
pub struct Compressed {
    /// The output bytes.
    pub bytes: Vec<u8>,
    /// Mime type of `bytes`. The original type on the untouched fast
    /// path, `image/jpeg` after a re-encode.
    pub mime_type: String,
    /// Whether `bytes` satisfies the budget. A false value is the
    /// best-effort outcome, not a failure; downstream consumers decide
    /// whether to reject it or accept it with a warning.
    pub within_budget: bool,
    /// Re-encode metadata; `None` exactly when the input was returned
    /// untouched.
    pub encode: Option<EncodeSummary>,
}

/// Compress `raw` to fit `budget` using the default policy.
///
/// See [`compress_with_policy`].
pub fn compress(
    raw: &[u8],
    declared_mime: Option<&str>,
    budget: Budget,
) -> Result<Compressed, CompressError> {
    compress_with_policy(raw, declared_mime, budget, &CompressionPolicy::default(), None)
}

/// Compress `raw` to fit `budget`.
///
/// # Arguments
///
/// * `raw` - Raw image file bytes
/// * `declared_mime` - Optional caller-supplied mime type; advisory only
/// * `budget` - Maximum output size; must be positive
/// * `policy` - Search tuning parameters
/// * `cancel` - Optional cancellation token, observed between attempts
///
/// # Returns
///
/// Inputs already within budget come back byte-identical with their
/// original mime type and `encode: None`. Everything else is decoded and
/// re-encoded as JPEG by the budget search; `within_budget: false` marks
/// the best-effort outcome where even the policy floors could not meet
/// the budget.
///
/// # Errors
///
/// Zero budgets and invalid policies are rejected before any decode or
/// encode work. Decode, encode and resample failures propagate unchanged.
pub fn compress_with_policy(
    raw: &[u8],
    declared_mime: Option<&str>,
    budget: Budget,
    policy: &CompressionPolicy,
    cancel: Option<&CancelToken>,
) -> Result<Compressed, CompressError> {
    if budget.max_bytes == 0 {
        return Err(CompressError::InvalidBudget);
    }
    policy.validate()?;

    // Fast path: already under budget, return the input untouched
    if budget.fits(raw.len()) {
        let mime_type = declared_mime
            .map(str::to_owned)
            .or_else(|| SourceFormat::sniff(raw).map(|f| f.mime_type().to_owned()))
            .unwrap_or_else(|| UNKNOWN_MIME_TYPE.to_owned());
        return Ok(Compressed {
            bytes: raw.to_vec(),
            mime_type,
            within_budget: true,
            encode: None,
        });
    }

    let buffer = decode(raw, declared_mime)?;
    let SearchOutcome {
        attempt,
        within_budget,
        trace,
    } = search_with_cancel(buffer, budget, policy, cancel)?;

    Ok(Compressed {
        mime_type: JPEG_MIME_TYPE.to_owned(),
        within_budget,
        encode: Some(EncodeSummary {
            quality: attempt.quality,
            width: attempt.width,
            height: attempt.height,
            attempts: trace.len() as u32,
        }),
        bytes: attempt.payload,
    })
}
