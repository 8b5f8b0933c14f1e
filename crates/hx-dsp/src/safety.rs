//! Output safety stage
//!
//! Soft limiting and the final finiteness net applied before samples are
//! written back to the host buffer.

use hx_core::Sample;

/// Magnitude above which the limiter engages
pub const LIMIT_THRESHOLD: f64 = 0.95;

/// Limiter input gain
pub const LIMIT_DRIVE: f64 = 0.8;

/// Limiter output gain; also the hard ceiling of the stage
pub const LIMIT_CEILING: f64 = 1.25;

/// `|x| > 0.95` maps to `tanh(0.8 x) * 1.25`, everything else passes
#[inline(always)]
pub fn soft_limit(x: Sample) -> Sample {
    if x.abs() > LIMIT_THRESHOLD {
        (LIMIT_DRIVE * x).tanh() * LIMIT_CEILING
    } else {
        x
    }
}

/// Replace non-finite samples with 0 and count the replacements
#[inline(always)]
pub fn sanitize(x: Sample, replaced: &mut u64) -> Sample {
    if x.is_finite() {
        x
    } else {
        *replaced += 1;
        0.0
    }
}
