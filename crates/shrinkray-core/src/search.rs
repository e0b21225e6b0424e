//! The budget search: iterative quality/resolution descent.
//!
//! Given a decoded pixel buffer and a byte budget, the search drives the
//! encoder through a strictly ordered sequence of attempts:
//!
//! 1. A fast-accept attempt at the starting quality. Most inputs fit here
//!    and the search ends after one encode.
//! 2. Quality descent: quality drops by a fixed step per attempt, at the
//!    current resolution, until the budget is met or the quality floor is
//!    reached.
//! 3. Resolution descent: the most recent attempt's size determines a
//!    damped shrink ratio, the buffer is resampled, quality resets to a
//!    mid-range value, and the quality descent repeats at the smaller
//!    resolution.
//!
//! Phases never re-enter: once resolution descent begins, the search stays
//! there until it terminates. If both quality and resolution are pinned at
//! their floors and the result still exceeds the budget, the search
//! returns its smallest attempt flagged `within_budget: false` rather than
//! failing; an oversized result is still more useful to the caller than no
//! result. A hard attempt cap bounds the run regardless of encoder
//! behavior.
//!
//! Each attempt depends on the previous attempt's measured size, so the
//! search is strictly sequential. Cancellation is observed between
//! attempts only; an in-flight encode runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::PixelBuffer;
use crate::encode::{encode_jpeg, EncodeError};
use crate::resample::{resample, shrink_dimensions, ResampleError};
use crate::{Budget, CompressionPolicy};

/// Tolerance when comparing a quality against the policy floor; keeps
/// repeated f32 subtraction from scheduling a duplicate floor attempt.
const QUALITY_EPS: f32 = 1e-3;

/// Errors that can terminate a search run.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The encoder failed on a valid buffer.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// A resample request was invalid.
    #[error(transparent)]
    Resample(#[from] ResampleError),

    /// The caller cancelled the run between attempts.
    #[error("Search cancelled by caller")]
    Cancelled,
}

/// The stage the search is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Lowering quality at a fixed resolution.
    QualityDescent,
    /// Lowering resolution, with quality descents nested inside.
    ResolutionDescent,
}

/// One completed encoder invocation, payload included.
///
/// The attempt returned from a search is the run's result; it is never
/// mutated after creation.
#[derive(Debug, Clone)]
pub struct EncodeAttempt {
    /// Normalized quality the encoder was given.
    pub quality: f32,
    /// Buffer width at this attempt.
    pub width: u32,
    /// Buffer height at this attempt.
    pub height: u32,
    /// The encoded bytes.
    pub payload: Vec<u8>,
}

impl EncodeAttempt {
    /// Size of the encoded payload in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Metadata for one attempt in the search trace.
///
/// Payloads are not retained here; keeping every candidate would defeat
/// the two-generations memory bound of the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Phase the search was in when the attempt ran.
    pub phase: Phase,
    /// Normalized quality of the attempt.
    pub quality: f32,
    /// Buffer width of the attempt.
    pub width: u32,
    /// Buffer height of the attempt.
    pub height: u32,
    /// Encoded size in bytes.
    pub size: u64,
}

/// Result of a completed search run.
#[derive(Debug)]
pub struct SearchOutcome {
    /// The winning attempt. When `within_budget` is false this is the
    /// smallest attempt the run recorded.
    pub attempt: EncodeAttempt,
    /// Whether the winning attempt satisfies the budget.
    pub within_budget: bool,
    /// One record per encoder invocation, in order.
    pub trace: Vec<AttemptRecord>,
}

impl SearchOutcome {
    /// Total number of encode attempts the run made.
    pub fn attempts(&self) -> u32 {
        self.trace.len() as u32
    }
}

/// Cooperative cancellation flag, observed at attempt boundaries.
///
/// Clones share the flag, so a caller can keep one half and hand the
/// other to a compression run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. No further attempts are scheduled after a
    /// run observes this.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

enum StepOutcome {
    /// The attempt satisfies the budget.
    Fit(EncodeAttempt),
    /// The attempt exceeds the budget.
    Over(EncodeAttempt),
}

/// Run the budget search without cancellation.
///
/// See [`search_with_cancel`].
pub fn search(
    buffer: PixelBuffer,
    budget: Budget,
    policy: &CompressionPolicy,
) -> Result<SearchOutcome, SearchError> {
    search_with_cancel(buffer, budget, policy, None)
}

/// Run the budget search over quality and resolution.
///
/// Consumes the buffer; resolution steps replace it one generation at a
/// time. The policy is assumed valid (see `CompressionPolicy::validate`).
///
/// # Returns
///
/// A [`SearchOutcome`] whose attempt either satisfies the budget, or is
/// the smallest attempt achievable at the policy floors (flagged with
/// `within_budget: false`).
///
/// # Errors
///
/// Encoder and resampler failures propagate unchanged; cancellation
/// observed between attempts returns `SearchError::Cancelled`. Running
/// out of room above the floors is not an error.
pub fn search_with_cancel(
    buffer: PixelBuffer,
    budget: Budget,
    policy: &CompressionPolicy,
    cancel: Option<&CancelToken>,
) -> Result<SearchOutcome, SearchError> {
    debug_assert!(policy.validate().is_ok(), "search needs a valid policy");

    let mut buffer = buffer;
    let mut quality = policy.start_quality;
    let mut phase = Phase::QualityDescent;
    let mut trace = Vec::new();

    if cancel.is_some_and(CancelToken::is_cancelled) {
        return Err(SearchError::Cancelled);
    }

    // Fast accept: one attempt at the starting quality
    let mut best = match encode_step(&buffer, quality, phase, budget, &mut trace)? {
        StepOutcome::Fit(attempt) => {
            return Ok(SearchOutcome {
                attempt,
                within_budget: true,
                trace,
            })
        }
        StepOutcome::Over(attempt) => attempt,
    };
    let mut last_size = best.size() as u64;

    loop {
        if trace.len() as u32 >= policy.max_attempts {
            warn!(
                "attempt cap ({}) reached at {} bytes over a {} byte budget",
                policy.max_attempts,
                best.size(),
                budget.max_bytes
            );
            break;
        }
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(SearchError::Cancelled);
        }

        if quality > policy.quality_floor + QUALITY_EPS {
            quality = (quality - policy.quality_step).max(policy.quality_floor);
        } else {
            // Quality is pinned; shrink the resolution or stop
            let (width, height) =
                shrink_dimensions(buffer.width(), buffer.height(), budget, last_size, policy);
            if width == buffer.width() && height == buffer.height() {
                warn!(
                    "budget {} unreachable at floor {}x{} q={:.2}; returning smallest attempt ({} bytes)",
                    budget.max_bytes,
                    width,
                    height,
                    quality,
                    best.size()
                );
                break;
            }
            debug!(
                "shrinking {}x{} -> {}x{}, quality reset to {:.2}",
                buffer.width(),
                buffer.height(),
                width,
                height,
                policy.reset_quality
            );
            phase = Phase::ResolutionDescent;
            buffer = resample(buffer, width, height, policy.filter)?;
            quality = policy.reset_quality;
        }

        match encode_step(&buffer, quality, phase, budget, &mut trace)? {
            StepOutcome::Fit(attempt) => {
                return Ok(SearchOutcome {
                    attempt,
                    within_budget: true,
                    trace,
                })
            }
            StepOutcome::Over(attempt) => {
                last_size = attempt.size() as u64;
                if attempt.size() < best.size() {
                    best = attempt;
                }
            }
        }
    }

    Ok(SearchOutcome {
        attempt: best,
        within_budget: false,
        trace,
    })
}

fn encode_step(
    buffer: &PixelBuffer,
    quality: f32,
    phase: Phase,
    budget: Budget,
    trace: &mut Vec<AttemptRecord>,
) -> Result<StepOutcome, SearchError> {
    let payload = encode_jpeg(buffer, quality)?;
    let attempt = EncodeAttempt {
        quality,
        width: buffer.width(),
        height: buffer.height(),
        payload,
    };
    trace.push(AttemptRecord {
        phase,
        quality,
        width: attempt.width,
        height: attempt.height,
        size: attempt.size() as u64,
    });
    debug!(
        "attempt {}: {}x{} q={:.2} -> {} bytes (budget {})",
        trace.len(),
        attempt.width,
        attempt.height,
        quality,
        attempt.size(),
        budget.max_bytes
    );

    if budget.fits(attempt.size()) {
        Ok(StepOutcome::Fit(attempt))
    } else {
        Ok(StepOutcome::Over(attempt))
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
