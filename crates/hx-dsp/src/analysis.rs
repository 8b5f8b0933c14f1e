//! Measurement helpers: level, spectrum, harmonic distortion
//!
//! Used by tests and the fuzz validators. Never called from `process`.
//!
//! Spectra use a rectangular window, so callers should analyse an integer
//! number of periods (e.g. 48000 samples at 48 kHz gives exact 1 Hz bins).

use hx_core::Decibels;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::Arc;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Floor for dB conversion
pub const MIN_DB: f64 = -300.0;

/// Bins below this frequency are treated as drift, not spurs
pub const SUBSONIC_HZ: f64 = 20.0;

// ============================================================================
// LEVEL
// ============================================================================

/// Absolute peak
pub fn peak(samples: &[f64]) -> f64 {
    samples.iter().fold(0.0, |acc, &x| acc.max(x.abs()))
}

/// Root mean square
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|x| x * x).sum::<f64>() / samples.len() as f64).sqrt()
}

/// Linear gain to dB, floored at [`MIN_DB`]
pub fn gain_to_db(gain: f64) -> f64 {
    Decibels::from_gain(gain).0.max(MIN_DB)
}

// ============================================================================
// SPECTRUM
// ============================================================================

/// Fixed-size real FFT analyzer
pub struct SpectrumAnalyzer {
    fft: Arc<dyn RealToComplex<f64>>,
    size: usize,
    input: Vec<f64>,
    output: Vec<Complex<f64>>,
    amplitudes: Vec<f64>,
}

impl SpectrumAnalyzer {
    pub fn new(size: usize) -> Self {
        let size = size.max(2);
        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(size);
        let output = fft.make_output_vec();
        let bins = output.len();

        Self {
            fft,
            size,
            input: vec![0.0; size],
            output,
            amplitudes: vec![0.0; bins],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Peak amplitude per bin of the first `size` samples (zero-padded if short).
    ///
    /// A full-scale sine on a bin centre reads 1.0.
    pub fn amplitudes(&mut self, signal: &[f64]) -> &[f64] {
        let n = signal.len().min(self.size);
        self.input[..n].copy_from_slice(&signal[..n]);
        self.input[n..].fill(0.0);

        if self.fft.process(&mut self.input, &mut self.output).is_err() {
            self.amplitudes.fill(0.0);
            return &self.amplitudes;
        }

        let scale = 2.0 / self.size as f64;
        for (amp, bin) in self.amplitudes.iter_mut().zip(&self.output) {
            *amp = bin.norm() * scale;
        }
        self.amplitudes[0] *= 0.5;
        &self.amplitudes
    }

    /// Harmonic analysis of `signal` for a fundamental at `fundamental_hz`.
    ///
    /// Harmonics `1..=max_harmonic` below Nyquist are reported; every
    /// harmonic below Nyquist is excluded from the residual.
    pub fn harmonics(
        &mut self,
        signal: &[f64],
        sample_rate: f64,
        fundamental_hz: f64,
        max_harmonic: usize,
    ) -> HarmonicReport {
        let size = self.size;
        let bin_hz = sample_rate / size as f64;
        let amps = self.amplitudes(signal);
        let last_bin = amps.len() - 1;
        let f0_bin = (fundamental_hz / bin_hz).round() as usize;
        let subsonic_bins = (SUBSONIC_HZ / bin_hz).ceil() as usize;

        let mut harmonics = vec![0.0; max_harmonic + 1];
        harmonics[0] = amps[0];
        let mut is_harmonic = vec![false; amps.len()];
        if f0_bin > 0 {
            let mut k = 1;
            while k * f0_bin <= last_bin {
                is_harmonic[k * f0_bin] = true;
                if k <= max_harmonic {
                    harmonics[k] = amps[k * f0_bin];
                }
                k += 1;
            }
        }

        let fundamental = harmonics.get(1).copied().unwrap_or(0.0);
        let harmonic_power: f64 = harmonics.iter().skip(2).map(|a| a * a).sum();

        let mut total_power = 0.0;
        let mut residual_power = 0.0;
        let mut max_spur: f64 = 0.0;
        for (bin, &a) in amps.iter().enumerate().skip(subsonic_bins.max(1)) {
            let p = a * a;
            total_power += p;
            if !is_harmonic[bin] {
                residual_power += p;
                max_spur = max_spur.max(a);
            }
        }

        let thd = if fundamental > 0.0 { harmonic_power.sqrt() / fundamental } else { 0.0 };
        let residual_db = if total_power > 0.0 {
            gain_to_db((residual_power / total_power).sqrt())
        } else {
            MIN_DB
        };
        let max_spur_db = if fundamental > 0.0 { gain_to_db(max_spur / fundamental) } else { MIN_DB };

        HarmonicReport {
            fundamental_hz: f0_bin as f64 * bin_hz,
            fundamental,
            harmonics,
            thd,
            residual_db,
            max_spur_db,
        }
    }
}

/// Result of [`SpectrumAnalyzer::harmonics`]
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HarmonicReport {
    /// Fundamental frequency snapped to the nearest bin
    pub fundamental_hz: f64,
    /// Fundamental amplitude
    pub fundamental: f64,
    /// `harmonics[k]` is the amplitude of harmonic `k`; index 0 is DC
    pub harmonics: Vec<f64>,
    /// Total harmonic distortion over the reported harmonics, as a ratio
    pub thd: f64,
    /// Non-harmonic power relative to total power, dB
    pub residual_db: f64,
    /// Largest non-harmonic bin relative to the fundamental, dB
    pub max_spur_db: f64,
}

impl HarmonicReport {
    /// Harmonic `k` relative to the fundamental, dB
    pub fn harmonic_db(&self, k: usize) -> f64 {
        match self.harmonics.get(k) {
            Some(&a) if self.fundamental > 0.0 => gain_to_db(a / self.fundamental),
            _ => MIN_DB,
        }
    }

    pub fn thd_percent(&self) -> f64 {
        self.thd * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_levels() {
        let s = [0.5, -1.0, 0.25];
        assert_eq!(peak(&s), 1.0);
        assert_relative_eq!(rms(&[1.0, -1.0]), 1.0);
        assert_eq!(rms(&[]), 0.0);
        assert_relative_eq!(gain_to_db(10.0), 20.0);
        assert_eq!(gain_to_db(0.0), MIN_DB);
        assert_eq!(gain_to_db(f64::NAN), MIN_DB);
    }

    #[test]
    fn test_sine_amplitude_on_bin() {
        let sr = 48000.0;
        let signal: Vec<f64> = (0..4800)
            .map(|i| 0.5 * (2.0 * PI * 1000.0 * i as f64 / sr).sin())
            .collect();
        let mut analyzer = SpectrumAnalyzer::new(4800);
        let amps = analyzer.amplitudes(&signal);
        assert_relative_eq!(amps[100], 0.5, epsilon = 1e-9);
        assert!(amps[101] < 1e-9);
    }

    #[test]
    fn test_harmonic_report() {
        let sr = 48000.0;
        let signal: Vec<f64> = (0..48000)
            .map(|i| {
                let t = i as f64 / sr;
                (2.0 * PI * 1000.0 * t).sin()
                    + 0.1 * (2.0 * PI * 2000.0 * t).sin()
                    + 0.01 * (2.0 * PI * 1234.0 * t).sin()
            })
            .collect();
        let report = SpectrumAnalyzer::new(48000).harmonics(&signal, sr, 1000.0, 5);
        assert_relative_eq!(report.fundamental, 1.0, epsilon = 1e-9);
        assert_relative_eq!(report.harmonic_db(2), -20.0, epsilon = 1e-6);
        assert_relative_eq!(report.thd, 0.1, epsilon = 1e-9);
        assert_relative_eq!(report.max_spur_db, -40.0, epsilon = 1e-6);
        assert!(report.residual_db < -40.0);
    }
}
