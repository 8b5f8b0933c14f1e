//! Biquad filter implementation using Transposed Direct Form II
//!
//! TDF-II keeps the state small and well conditioned in floating point.
//! State is flushed of denormals after every sample and cleared if it ever
//! goes non-finite.

use hx_core::Sample;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

use crate::denormal::flush_denormal;
use crate::{MonoProcessor, Processor};

/// Butterworth Q for a single second-order section
pub const BUTTERWORTH_Q: f64 = FRAC_1_SQRT_2;

/// Biquad coefficients (normalized so `a0 == 1`)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Calculate lowpass filter coefficients
    pub fn lowpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let b0 = (1.0 - cos_omega) / 2.0;
        let b1 = 1.0 - cos_omega;
        let b2 = (1.0 - cos_omega) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Butterworth lowpass section
    pub fn butterworth_lowpass(freq: f64, sample_rate: f64) -> Self {
        Self::lowpass(freq, BUTTERWORTH_Q, sample_rate)
    }
}

/// Transposed Direct Form II biquad filter
#[derive(Debug, Clone)]
pub struct BiquadTDF2 {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl BiquadTDF2 {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }
}

impl Processor for BiquadTDF2 {
    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

impl MonoProcessor for BiquadTDF2 {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let c = &self.coeffs;
        let output = c.b0 * input + self.z1;
        self.z1 = flush_denormal(c.b1 * input - c.a1 * output + self.z2);
        self.z2 = flush_denormal(c.b2 * input - c.a2 * output);
        if !(self.z1.is_finite() && self.z2.is_finite()) {
            self.z1 = 0.0;
            self.z2 = 0.0;
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lowpass_1k() -> BiquadTDF2 {
        BiquadTDF2::new(BiquadCoeffs::butterworth_lowpass(1000.0, 48000.0))
    }

    #[test]
    fn test_lowpass_dc() {
        let mut filter = lowpass_1k();

        // DC signal should pass through lowpass
        for _ in 0..1000 {
            filter.process_sample(1.0);
        }
        let output = filter.process_sample(1.0);
        assert!((output - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_butterworth_is_minus_3_db_at_cutoff() {
        let c = BiquadCoeffs::butterworth_lowpass(1000.0, 48000.0);
        let w = 2.0 * PI * 1000.0 / 48000.0;
        let (cos1, sin1, cos2, sin2) = (w.cos(), w.sin(), (2.0 * w).cos(), (2.0 * w).sin());
        let num = ((c.b0 + c.b1 * cos1 + c.b2 * cos2).powi(2) + (c.b1 * sin1 + c.b2 * sin2).powi(2)).sqrt();
        let den = ((1.0 + c.a1 * cos1 + c.a2 * cos2).powi(2) + (c.a1 * sin1 + c.a2 * sin2).powi(2)).sqrt();
        let db = 20.0 * (num / den).log10();
        assert!((db + 3.0103).abs() < 0.01, "{db} dB");
    }

    #[test]
    fn test_lowpass_attenuates_above_cutoff() {
        let sr = 48000.0;
        let mut filter = BiquadTDF2::new(BiquadCoeffs::butterworth_lowpass(500.0, sr));
        let mut peak = 0.0f64;
        for i in 0..9600 {
            let x = (2.0 * PI * 8000.0 * i as f64 / sr).sin();
            let y = filter.process_sample(x);
            if i > 4800 {
                peak = peak.max(y.abs());
            }
        }
        // two-pole rolloff, 4 octaves up: about -48 dB
        assert!(peak < 0.01, "peak {peak}");
    }

    #[test]
    fn test_reset() {
        let mut filter = lowpass_1k();

        for _ in 0..100 {
            filter.process_sample(1.0);
        }

        filter.reset();

        assert_eq!(filter.z1, 0.0);
        assert_eq!(filter.z2, 0.0);
    }

    #[test]
    fn test_state_recovers_from_non_finite_input() {
        let mut filter = lowpass_1k();
        filter.process_sample(f64::INFINITY);
        assert_eq!(filter.z1, 0.0);
        assert_eq!(filter.z2, 0.0);
        assert!(filter.process_sample(0.5).is_finite());
    }

    #[test]
    fn test_decay_flushes_to_zero() {
        let mut filter = lowpass_1k();
        filter.process_sample(1.0);
        for _ in 0..200_000 {
            filter.process_sample(0.0);
        }
        assert_eq!(filter.z1, 0.0);
        assert_eq!(filter.z2, 0.0);
    }
}
