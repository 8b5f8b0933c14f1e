//! Polyphase Oversampling
//!
//! 2x/4x oversampling for the nonlinear stage:
//! - Kaiser-windowed sinc prototype, cutoff at 0.9 of the base Nyquist
//! - Polyphase upsampler (image rejection after zero-stuffing)
//! - Decimating FIR (anti-aliasing before downsampling)
//! - Double-length history rings so every tap sum is one contiguous dot
//!   product through the SIMD dispatch
//!
//! Round-trip latency is exactly `taps_per_phase - 1` base-rate samples.

use hx_core::Sample;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::Processor;
use crate::simd::{DotFn, DspDispatch};

// ═══════════════════════════════════════════════════════════════════════════════
// MODES
// ═══════════════════════════════════════════════════════════════════════════════

/// Largest supported factor
pub const MAX_FACTOR: usize = 4;

/// Prototype cutoff as a fraction of the base-rate Nyquist
pub const CUTOFF_RATIO: f64 = 0.9;

/// Oversampling factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OversampleFactor {
    /// 2x oversampling
    #[default]
    X2,
    /// 4x oversampling
    X4,
}

impl OversampleFactor {
    #[inline]
    pub const fn factor(self) -> usize {
        match self {
            Self::X2 => 2,
            Self::X4 => 4,
        }
    }
}

/// Filter quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OversampleQuality {
    /// 64 taps per phase, 80 dB stopband
    #[default]
    Standard,
    /// 96 taps per phase, 100 dB stopband
    High,
}

impl OversampleQuality {
    #[inline]
    pub const fn taps_per_phase(self) -> usize {
        match self {
            Self::Standard => 64,
            Self::High => 96,
        }
    }

    #[inline]
    pub const fn attenuation_db(self) -> f64 {
        match self {
            Self::Standard => 80.0,
            Self::High => 100.0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILTER DESIGN
// ═══════════════════════════════════════════════════════════════════════════════

/// Kaiser-windowed sinc lowpass, normalized to unity DC gain.
///
/// `cutoff` is in cycles per sample (0.5 = Nyquist).
pub fn design_lowpass(num_taps: usize, cutoff: f64, atten_db: f64) -> Vec<f64> {
    if num_taps == 0 {
        return Vec::new();
    }
    if num_taps == 1 {
        return vec![1.0];
    }
    let m = (num_taps - 1) as f64;
    let beta = kaiser_beta(atten_db);
    let i0_beta = bessel_i0(beta);

    let mut coeffs: Vec<f64> = (0..num_taps)
        .map(|i| {
            let n = i as f64 - m / 2.0;
            let sinc = if n.abs() < 1e-10 {
                2.0 * cutoff
            } else {
                (2.0 * PI * cutoff * n).sin() / (PI * n)
            };

            let ratio = n / (m / 2.0);
            let arg = 1.0 - ratio * ratio;
            let window = if arg > 0.0 {
                bessel_i0(beta * arg.sqrt()) / i0_beta
            } else {
                0.0
            };

            sinc * window
        })
        .collect();

    let sum: f64 = coeffs.iter().sum();
    if sum.abs() > 1e-10 {
        for c in &mut coeffs {
            *c /= sum;
        }
    }
    coeffs
}

/// Kaiser beta for a stopband attenuation in dB
pub fn kaiser_beta(atten_db: f64) -> f64 {
    if atten_db > 50.0 {
        0.1102 * (atten_db - 8.7)
    } else if atten_db >= 21.0 {
        0.5842 * (atten_db - 21.0).powf(0.4) + 0.07886 * (atten_db - 21.0)
    } else {
        0.0
    }
}

/// Modified Bessel function of the first kind, order 0 (polynomial approximation)
fn bessel_i0(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 3.75 {
        let y = (x / 3.75).powi(2);
        1.0 + y
            * (3.5156229
                + y * (3.0899424
                    + y * (1.2067492 + y * (0.2659732 + y * (0.0360768 + y * 0.0045813)))))
    } else {
        let y = 3.75 / ax;
        (ax.exp() / ax.sqrt())
            * (0.39894228
                + y * (0.01328592
                    + y * (0.00225319
                        + y * (-0.00157565
                            + y * (0.00916281
                                + y * (-0.02057706
                                    + y * (0.02635537 + y * (-0.01647633 + y * 0.00392377))))))))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HISTORY LINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-length history stored twice, so the last `len` samples are always
/// one contiguous slice ordered oldest to newest.
#[derive(Debug, Clone)]
pub struct HistoryLine {
    buf: Vec<f64>,
    pos: usize,
    len: usize,
}

impl HistoryLine {
    pub fn new(len: usize) -> Self {
        let len = len.max(1);
        Self {
            buf: vec![0.0; 2 * len],
            pos: 0,
            len,
        }
    }

    #[inline(always)]
    pub fn push(&mut self, x: f64) {
        self.buf[self.pos] = x;
        self.buf[self.pos + self.len] = x;
        self.pos += 1;
        if self.pos == self.len {
            self.pos = 0;
        }
    }

    /// Last `len` samples, oldest first
    #[inline(always)]
    pub fn window(&self) -> &[f64] {
        &self.buf[self.pos..self.pos + self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn reset(&mut self) {
        self.buf.fill(0.0);
        self.pos = 0;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POLYPHASE STAGES
// ═══════════════════════════════════════════════════════════════════════════════

/// Interpolator: one base-rate sample in, `factor` high-rate samples out
#[derive(Debug, Clone)]
pub struct PolyphaseUpsampler {
    /// Sub-filters, time-reversed to match the history order
    phases: Vec<Vec<f64>>,
    history: HistoryLine,
    dot: DotFn,
}

impl PolyphaseUpsampler {
    /// Split `prototype` into `factor` phases, each scaled by `factor`
    pub fn new(prototype: &[f64], factor: usize) -> Self {
        let factor = factor.max(1);
        let taps_per_phase = prototype.len().div_ceil(factor);
        let phases = (0..factor)
            .map(|p| {
                let mut phase: Vec<f64> = (0..taps_per_phase)
                    .map(|j| prototype.get(p + j * factor).copied().unwrap_or(0.0) * factor as f64)
                    .collect();
                phase.reverse();
                phase
            })
            .collect();

        Self {
            phases,
            history: HistoryLine::new(taps_per_phase),
            dot: DspDispatch::get().dot,
        }
    }

    /// Writes `output.len()` (at most `factor`) high-rate samples
    #[inline]
    pub fn process(&mut self, input: Sample, output: &mut [Sample]) {
        self.history.push(input);
        let window = self.history.window();
        for (out, phase) in output.iter_mut().zip(&self.phases) {
            *out = (self.dot)(window, phase);
        }
    }

    pub fn factor(&self) -> usize {
        self.phases.len()
    }

    pub fn reset(&mut self) {
        self.history.reset();
    }
}

/// Decimator: `factor` high-rate samples in, one base-rate sample out
#[derive(Debug, Clone)]
pub struct PolyphaseDecimator {
    /// Prototype, time-reversed to match the history order
    coeffs: Vec<f64>,
    history: HistoryLine,
    dot: DotFn,
}

impl PolyphaseDecimator {
    pub fn new(prototype: &[f64]) -> Self {
        let mut coeffs = prototype.to_vec();
        coeffs.reverse();
        Self {
            history: HistoryLine::new(coeffs.len()),
            coeffs,
            dot: DspDispatch::get().dot,
        }
    }

    /// Only the output phase is computed; the rest are discarded by decimation
    #[inline]
    pub fn process(&mut self, input: &[Sample]) -> Sample {
        for &x in input {
            self.history.push(x);
        }
        (self.dot)(self.history.window(), &self.coeffs)
    }

    pub fn reset(&mut self) {
        self.history.reset();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OVERSAMPLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Matched upsampler/decimator pair
#[derive(Debug, Clone)]
pub struct Oversampler {
    factor: OversampleFactor,
    quality: OversampleQuality,
    prototype: Vec<f64>,
    up: PolyphaseUpsampler,
    down: PolyphaseDecimator,
}

impl Oversampler {
    pub fn new(factor: OversampleFactor, quality: OversampleQuality) -> Self {
        let f = factor.factor();
        let num_taps = f * quality.taps_per_phase();
        let cutoff = CUTOFF_RATIO * 0.5 / f as f64;
        let prototype = design_lowpass(num_taps, cutoff, quality.attenuation_db());

        Self {
            factor,
            quality,
            up: PolyphaseUpsampler::new(&prototype, f),
            down: PolyphaseDecimator::new(&prototype),
            prototype,
        }
    }

    /// Upsample `input` into `output[..input.len() * factor]`.
    ///
    /// If `output` is short, only the input samples that fit are consumed.
    pub fn upsample(&mut self, input: &[Sample], output: &mut [Sample]) {
        let f = self.factor.factor();
        for (&x, chunk) in input.iter().zip(output.chunks_exact_mut(f)) {
            self.up.process(x, chunk);
        }
    }

    /// Downsample `input` (length `output.len() * factor`) into `output`
    pub fn downsample(&mut self, input: &[Sample], output: &mut [Sample]) {
        let f = self.factor.factor();
        for (chunk, out) in input.chunks_exact(f).zip(output.iter_mut()) {
            *out = self.down.process(chunk);
        }
    }

    /// Upsample one sample, apply `shape` at the high rate, decimate back
    #[inline]
    pub fn process_with<F>(&mut self, input: Sample, mut shape: F) -> Sample
    where
        F: FnMut(Sample) -> Sample,
    {
        let f = self.factor.factor();
        let mut high = [0.0; MAX_FACTOR];
        let high = &mut high[..f];
        self.up.process(input, high);
        for x in high.iter_mut() {
            *x = shape(*x);
        }
        self.down.process(high)
    }

    /// Round-trip latency in base-rate samples
    #[inline]
    pub fn latency(&self) -> usize {
        self.quality.taps_per_phase() - 1
    }

    pub fn factor(&self) -> OversampleFactor {
        self.factor
    }

    pub fn quality(&self) -> OversampleQuality {
        self.quality
    }

    pub fn taps_per_phase(&self) -> usize {
        self.quality.taps_per_phase()
    }

    /// The anti-imaging/anti-aliasing prototype at the high rate
    pub fn prototype(&self) -> &[f64] {
        &self.prototype
    }

    /// Prototype magnitude in dB at `freq` cycles per high-rate sample
    pub fn response_db(&self, freq: f64) -> f64 {
        let (mut re, mut im) = (0.0, 0.0);
        for (n, &h) in self.prototype.iter().enumerate() {
            let phase = 2.0 * PI * freq * n as f64;
            re += h * phase.cos();
            im -= h * phase.sin();
        }
        20.0 * (re * re + im * im).sqrt().max(1e-20).log10()
    }
}

impl Processor for Oversampler {
    fn reset(&mut self) {
        self.up.reset();
        self.down.reset();
    }

    fn latency(&self) -> usize {
        Oversampler::latency(self)
    }
}
