//! One-pole DC blocking high-pass
//!
//! `y[n] = x[n] - x[n-1] + R * y[n-1]` with `R = exp(-2π fc / fs)`.

use hx_core::Sample;
use std::f64::consts::PI;

use crate::denormal::flush_denormal;
use crate::{MonoProcessor, Processor};

/// Default corner frequency
pub const DEFAULT_DC_CUTOFF_HZ: f64 = 20.0;

#[derive(Debug, Clone)]
pub struct DcBlocker {
    r: f64,
    x1: f64,
    y1: f64,
}

impl DcBlocker {
    pub fn new(cutoff_hz: f64, sample_rate: f64) -> Self {
        Self {
            r: Self::pole(cutoff_hz, sample_rate),
            x1: 0.0,
            y1: 0.0,
        }
    }

    fn pole(cutoff_hz: f64, sample_rate: f64) -> f64 {
        let r = (-2.0 * PI * cutoff_hz / sample_rate).exp();
        if r.is_finite() { r.clamp(0.0, 1.0 - 1e-9) } else { 0.0 }
    }
}

impl Processor for DcBlocker {
    fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

impl MonoProcessor for DcBlocker {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let output = input - self.x1 + self.r * self.y1;
        self.x1 = input;
        self.y1 = flush_denormal(output);
        if !self.y1.is_finite() || !self.x1.is_finite() {
            self.reset();
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_coefficient_at_48k() {
        let dc = DcBlocker::new(DEFAULT_DC_CUTOFF_HZ, 48000.0);
        assert_relative_eq!(dc.r, 0.99738, epsilon = 1e-5);
    }

    #[test]
    fn test_removes_dc() {
        let mut dc = DcBlocker::new(20.0, 48000.0);
        let mut out = 0.0;
        for _ in 0..48000 {
            out = dc.process_sample(0.5);
        }
        assert!(out.abs() < 1e-6, "residual {out}");
    }

    #[test]
    fn test_passes_audio_band() {
        let sr = 48000.0;
        let mut dc = DcBlocker::new(20.0, sr);
        let mut peak = 0.0f64;
        for i in 0..48000 {
            let x = (2.0 * PI * 1000.0 * i as f64 / sr).sin();
            let y = dc.process_sample(x);
            if i > 24000 {
                peak = peak.max(y.abs());
            }
        }
        assert!((peak - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_silence_stays_exact_zero() {
        let mut dc = DcBlocker::new(20.0, 48000.0);
        for _ in 0..1000 {
            assert_eq!(dc.process_sample(0.0), 0.0);
        }
    }

    #[test]
    fn test_pole_tracks_sample_rate() {
        let at_48k = DcBlocker::new(20.0, 48000.0).r;
        assert!(DcBlocker::new(20.0, 8000.0).r < at_48k);
        assert_eq!(DcBlocker::new(20.0, 0.0).r, 0.0);
    }
}
