//! Harmonic generation (memoryless waveshapers)
//!
//! Includes:
//! - Tube: biased tanh plus an explicit square term, even-heavy
//! - Transistor: odd-symmetric tanh with a smooth crossover notch
//! - Tape: smooth algebraic saturation
//! - Diode: asymmetric conduction
//! - Fold: triangular wavefolding
//!
//! Every curve maps 0 to 0 and stays finite for any finite input. The
//! generator blends a warm and a bright curve by `color` and then
//! crossfades with the input by `drive`, so drive 0 is an exact identity.

use hx_core::Sample;
use serde::{Deserialize, Serialize};

// ============ Constants ============

/// Pre-gain slope: `g = 1 + DRIVE_GAIN * drive`
pub const DRIVE_GAIN: f64 = 3.0;

/// Tube grid bias per unit of drive (negative: pushes toward cutoff)
pub const TUBE_BIAS: f64 = 0.25;

/// Weight of the explicit square term in the tube curve
pub const EVEN_WEIGHT: f64 = 0.5;

/// Width of the transistor crossover region. Narrower notches put
/// harmonics above what 2x oversampling can reject.
pub const CROSSOVER_WIDTH: f64 = 0.15;

/// Depth of the transistor crossover notch per unit of drive
pub const CROSSOVER_DEPTH: f64 = 0.5;

/// Diode reverse-side attenuation per unit of drive
pub const DIODE_ASYMMETRY: f64 = 0.4;

/// Curve inputs are clamped to this magnitude before shaping
pub const CURVE_INPUT_LIMIT: f64 = 4.0;

// ============ Curve Models ============

/// Transfer curve family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveModel {
    /// Biased tube stage, mostly 2nd harmonic
    #[default]
    Tube,
    /// Push-pull transistor stage, odd harmonics only
    Transistor,
    /// Tape-style soft saturation
    Tape,
    /// Single-ended diode clipper
    Diode,
    /// Triangular wavefolder
    Fold,
}

impl CurveModel {
    /// Resolve the drive-dependent constants for `drive` in `[0, 1]`.
    /// `bias_offset` shifts the tube bias.
    #[inline]
    pub fn coeffs(self, drive: f64, bias_offset: f64) -> CurveCoeffs {
        let g = 1.0 + DRIVE_GAIN * drive;
        let mut c = CurveCoeffs {
            drive,
            g,
            ..CurveCoeffs::default()
        };
        match self {
            CurveModel::Tube => {
                c.bias = (-TUBE_BIAS + bias_offset) * drive;
                c.tanh_gb = (g * c.bias).tanh();
                c.norm = g.tanh();
            }
            CurveModel::Transistor | CurveModel::Diode => c.norm = g.tanh(),
            CurveModel::Tape => c.norm = g / (1.0 + g * g).sqrt(),
            CurveModel::Fold => {}
        }
        c
    }

    /// Shape `x` with constants from [`CurveModel::coeffs`]
    #[inline]
    pub fn shape_with(self, x: f64, c: &CurveCoeffs) -> f64 {
        let x = x.clamp(-CURVE_INPUT_LIMIT, CURVE_INPUT_LIMIT);
        match self {
            CurveModel::Tube => tube(x, c),
            CurveModel::Transistor => transistor(x, c),
            CurveModel::Tape => tape(x, c),
            CurveModel::Diode => diode(x, c),
            CurveModel::Fold => fold(c.g * x),
        }
    }

    /// Shape `x` at `drive` in `[0, 1]`. `bias_offset` shifts the tube bias.
    #[inline]
    pub fn shape(self, x: f64, drive: f64, bias_offset: f64) -> f64 {
        self.shape_with(x, &self.coeffs(drive, bias_offset))
    }

    pub const fn name(self) -> &'static str {
        match self {
            CurveModel::Tube => "tube",
            CurveModel::Transistor => "transistor",
            CurveModel::Tape => "tape",
            CurveModel::Diode => "diode",
            CurveModel::Fold => "fold",
        }
    }
}

/// Per-drive curve constants. The oversampled path shapes `factor` samples
/// per base-rate sample with one set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurveCoeffs {
    drive: f64,
    /// Pre-gain `1 + DRIVE_GAIN * drive`
    g: f64,
    /// Output normalization
    norm: f64,
    /// Tube grid bias
    bias: f64,
    /// `tanh(g * bias)`
    tanh_gb: f64,
}

/// `(tanh(g(x+b)) - tanh(g b)) / tanh(g) + w * drive * x²`
#[inline(always)]
fn tube(x: f64, c: &CurveCoeffs) -> f64 {
    let biased = ((c.g * (x + c.bias)).tanh() - c.tanh_gb) / c.norm;
    biased + EVEN_WEIGHT * c.drive * x * x
}

/// `tanh(g x) / tanh(g) - x * exp(-(x/w)²) * drive * depth`
#[inline(always)]
fn transistor(x: f64, c: &CurveCoeffs) -> f64 {
    let r = x / CROSSOVER_WIDTH;
    let notch = x * (-r * r).exp() * c.drive * CROSSOVER_DEPTH;
    (c.g * x).tanh() / c.norm - notch
}

/// `g x / sqrt(1 + (g x)²)`, normalized so that `x = 1` maps to 1
#[inline(always)]
fn tape(x: f64, c: &CurveCoeffs) -> f64 {
    let gx = c.g * x;
    gx / (1.0 + gx * gx).sqrt() / c.norm
}

/// Forward side as tanh, reverse side softened by up to `1 - 0.4 * drive`
#[inline(always)]
fn diode(x: f64, c: &CurveCoeffs) -> f64 {
    let conduction = 0.5 - 0.5 * (x / CROSSOVER_WIDTH).tanh();
    let scale = 1.0 - DIODE_ASYMMETRY * c.drive * conduction;
    scale * (c.g * x).tanh() / c.norm
}

/// Reflect at ±1 until the value lies inside the range
#[inline(always)]
fn fold(x: f64) -> f64 {
    1.0 - ((x + 1.0).rem_euclid(4.0) - 2.0).abs()
}

// ============ Shaper Pair ============

/// The two curves `color` blends between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaperPair {
    /// Curve at color 0
    pub warm: CurveModel,
    /// Curve at color 1
    pub bright: CurveModel,
}

impl ShaperPair {
    pub const fn new(warm: CurveModel, bright: CurveModel) -> Self {
        Self { warm, bright }
    }
}

impl Default for ShaperPair {
    fn default() -> Self {
        Self::new(CurveModel::Tube, CurveModel::Transistor)
    }
}

// ============ Harmonic Generator ============

/// Color-blended waveshaper with drive crossfade
#[derive(Debug, Clone, Default)]
pub struct HarmonicGenerator {
    pair: ShaperPair,
    bias_offset: f64,
}

impl HarmonicGenerator {
    pub fn new(pair: ShaperPair) -> Self {
        Self {
            pair,
            bias_offset: 0.0,
        }
    }

    /// Extra tube bias (thermal drift); updated once per block
    #[inline]
    pub fn set_bias_offset(&mut self, offset: f64) {
        self.bias_offset = if offset.is_finite() { offset } else { 0.0 };
    }

    pub fn bias_offset(&self) -> f64 {
        self.bias_offset
    }

    /// Resolve `drive` and `color` into a shaper for the current sample
    #[inline]
    pub fn at(&self, drive: f64, color: f64) -> Shaper {
        if drive.is_nan() || drive <= 0.0 {
            return Shaper::identity(self.pair);
        }
        let drive = drive.min(1.0);
        let color = if color.is_nan() { 0.0 } else { color.clamp(0.0, 1.0) };

        Shaper {
            pair: self.pair,
            warm: if color < 1.0 {
                self.pair.warm.coeffs(drive, self.bias_offset)
            } else {
                CurveCoeffs::default()
            },
            bright: if color > 0.0 {
                self.pair.bright.coeffs(drive, self.bias_offset)
            } else {
                CurveCoeffs::default()
            },
            drive,
            color,
        }
    }

    /// `x + (shaped - x) * drive` where `shaped = warm*(1-color) + bright*color`
    #[inline]
    pub fn process(&self, input: Sample, drive: f64, color: f64) -> Sample {
        self.at(drive, color).process(input)
    }
}

/// A [`HarmonicGenerator`] with drive and color resolved
#[derive(Debug, Clone, Copy)]
pub struct Shaper {
    pair: ShaperPair,
    warm: CurveCoeffs,
    bright: CurveCoeffs,
    /// 0 means identity
    drive: f64,
    color: f64,
}

impl Shaper {
    fn identity(pair: ShaperPair) -> Self {
        Self {
            pair,
            warm: CurveCoeffs::default(),
            bright: CurveCoeffs::default(),
            drive: 0.0,
            color: 0.0,
        }
    }

    /// Non-finite input gives 0
    #[inline]
    pub fn process(&self, input: Sample) -> Sample {
        if !input.is_finite() {
            return 0.0;
        }
        if self.drive <= 0.0 {
            return input;
        }

        let warm = if self.color < 1.0 {
            self.pair.warm.shape_with(input, &self.warm)
        } else {
            0.0
        };
        let bright = if self.color > 0.0 {
            self.pair.bright.shape_with(input, &self.bright)
        } else {
            0.0
        };
        let shaped = warm * (1.0 - self.color) + bright * self.color;
        input + (shaped - input) * self.drive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SpectrumAnalyzer;
    use std::f64::consts::PI;

    const MODELS: [CurveModel; 5] = [
        CurveModel::Tube,
        CurveModel::Transistor,
        CurveModel::Tape,
        CurveModel::Diode,
        CurveModel::Fold,
    ];

    fn sine(freq: f64, amp: f64, sr: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| amp * (2.0 * PI * freq * i as f64 / sr).sin())
            .collect()
    }

    #[test]
    fn test_drive_zero_is_identity() {
        let generator = HarmonicGenerator::default();
        for &x in &[-1.0, -0.3, 0.0, 0.01, 0.7, 1.5] {
            for &color in &[0.0, 0.5, 1.0] {
                assert_eq!(generator.process(x, 0.0, color), x);
            }
        }
    }

    #[test]
    fn test_curves_map_zero_to_zero() {
        for model in MODELS {
            for &drive in &[0.0, 0.3, 1.0] {
                let y = model.shape(0.0, drive, 0.0);
                assert!(y.abs() < 1e-15, "{} at drive {drive}: {y}", model.name());
            }
        }
    }

    #[test]
    fn test_non_finite_input_gives_zero() {
        let generator = HarmonicGenerator::default();
        assert_eq!(generator.process(f64::NAN, 0.5, 0.5), 0.0);
        assert_eq!(generator.process(f64::INFINITY, 0.5, 0.5), 0.0);
    }

    #[test]
    fn test_output_finite_for_extreme_input() {
        for model in MODELS {
            let generator = HarmonicGenerator::new(ShaperPair::new(model, model));
            for &x in &[-1e300, -10.0, 1e-300, 10.0, 1e300] {
                let y = generator.process(x, 1.0, 0.5);
                assert!(y.is_finite(), "{}: {x} -> {y}", model.name());
            }
        }
    }

    #[test]
    fn test_transistor_is_odd() {
        for &x in &[0.01, 0.04, 0.2, 0.9] {
            let pos = CurveModel::Transistor.shape(x, 0.8, 0.0);
            let neg = CurveModel::Transistor.shape(-x, 0.8, 0.0);
            assert!((pos + neg).abs() < 1e-15);
        }
    }

    #[test]
    fn test_fold_stays_bounded() {
        for i in -400..=400 {
            let x = i as f64 * 0.05;
            let y = fold(x);
            assert!((-1.0..=1.0).contains(&y));
        }
        assert_eq!(fold(0.5), 0.5);
        assert_eq!(fold(1.5), 0.5);
        assert_eq!(fold(-1.5), -0.5);
    }

    #[test]
    fn test_warm_favours_second_harmonic() {
        let sr = 48000.0;
        let shaper = HarmonicGenerator::default().at(0.5, 0.0);
        let signal: Vec<f64> = sine(1000.0, 0.25, sr, 48000).into_iter().map(|x| shaper.process(x)).collect();

        let report = SpectrumAnalyzer::new(48000).harmonics(&signal, sr, 1000.0, 5);
        let h2 = report.harmonic_db(2);
        let h3 = report.harmonic_db(3);
        assert!(h2 > h3 + 6.0, "H2 {h2:.1} dB, H3 {h3:.1} dB");
    }

    #[test]
    fn test_bright_has_no_even_harmonics() {
        let sr = 48000.0;
        let shaper = HarmonicGenerator::default().at(0.5, 1.0);
        let signal: Vec<f64> = sine(1000.0, 0.25, sr, 48000).into_iter().map(|x| shaper.process(x)).collect();

        let report = SpectrumAnalyzer::new(48000).harmonics(&signal, sr, 1000.0, 5);
        assert!(report.harmonic_db(3) > report.harmonic_db(2) + 6.0);
        assert!(report.harmonic_db(2) < -120.0);
    }

    #[test]
    fn test_bias_offset_sanitized() {
        let mut generator = HarmonicGenerator::default();
        generator.set_bias_offset(f64::NAN);
        assert_eq!(generator.bias_offset(), 0.0);
        generator.set_bias_offset(0.01);
        assert_eq!(generator.bias_offset(), 0.01);
    }

    #[test]
    fn test_resolved_shaper_matches_generator() {
        let mut generator = HarmonicGenerator::new(ShaperPair::new(CurveModel::Tube, CurveModel::Diode));
        generator.set_bias_offset(0.02);
        for &(drive, color) in &[(0.0, 0.5), (0.35, 0.0), (0.8, 0.4), (1.0, 1.0), (f64::NAN, 0.5)] {
            let shaper = generator.at(drive, color);
            for &x in &[-2.0, -0.3, 0.0, 0.04, 0.6, 5.0, f64::NAN] {
                let y = shaper.process(x);
                assert_eq!(y.to_bits(), generator.process(x, drive, color).to_bits());
            }
        }
    }

    #[test]
    fn test_coeffs_match_direct_shape() {
        for model in MODELS {
            let c = model.coeffs(0.6, -0.01);
            for &x in &[-0.9, -0.1, 0.2, 0.75] {
                assert_eq!(model.shape_with(x, &c), model.shape(x, 0.6, -0.01));
            }
        }
    }
}
