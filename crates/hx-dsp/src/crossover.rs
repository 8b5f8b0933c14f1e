//! Linkwitz-Riley Three-Band Crossover
//!
//! Lowpass sections are LR4 (two cascaded Butterworth biquads). Every
//! highpass is formed by subtraction, so the bands always sum back to the
//! input exactly (up to rounding):
//!
//! ```text
//! low  = LP1(x)
//! rest = x - low
//! mid  = LP2(rest)
//! high = rest - mid
//! ```

use hx_core::Sample;

use crate::biquad::{BiquadCoeffs, BiquadTDF2};
use crate::{MonoProcessor, Processor};

// ============ Constants ============

/// Number of bands
pub const NUM_BANDS: usize = 3;

/// Default low/mid split
pub const DEFAULT_LOW_CROSSOVER_HZ: f64 = 800.0;

/// Default mid/high split
pub const DEFAULT_HIGH_CROSSOVER_HZ: f64 = 5000.0;

/// Lowest accepted split frequency
pub const MIN_CROSSOVER_HZ: f64 = 20.0;

/// Highest accepted split, as a fraction of Nyquist
pub const MAX_CROSSOVER_NYQUIST_RATIO: f64 = 0.49;

/// Minimum ratio between the high and low split
pub const MIN_SPLIT_RATIO: f64 = 1.25;

// ============ Band ============

/// Band index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Low = 0,
    Mid = 1,
    High = 2,
}

impl Band {
    pub const ALL: [Band; NUM_BANDS] = [Band::Low, Band::Mid, Band::High];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Band::Low => "low",
            Band::Mid => "mid",
            Band::High => "high",
        }
    }
}

/// Clamp a split frequency to `[20 Hz, 0.49 * Nyquist]`
#[inline]
pub fn clamp_crossover_frequency(freq: f64, sample_rate: f64) -> f64 {
    let max = MAX_CROSSOVER_NYQUIST_RATIO * sample_rate * 0.5;
    if freq.is_nan() {
        return MIN_CROSSOVER_HZ;
    }
    freq.clamp(MIN_CROSSOVER_HZ, max.max(MIN_CROSSOVER_HZ))
}

/// Clamp both splits and keep `high >= 1.25 * low`
pub fn resolve_split_points(low_hz: f64, high_hz: f64, sample_rate: f64) -> (f64, f64) {
    let max = clamp_crossover_frequency(f64::INFINITY, sample_rate);
    let mut low = clamp_crossover_frequency(low_hz, sample_rate);
    let mut high = clamp_crossover_frequency(high_hz, sample_rate);

    if high < low * MIN_SPLIT_RATIO {
        high = (low * MIN_SPLIT_RATIO).min(max);
        if high < low * MIN_SPLIT_RATIO {
            low = (high / MIN_SPLIT_RATIO).max(MIN_CROSSOVER_HZ);
        }
    }
    (low, high)
}

// ============ Linkwitz-Riley Filter ============

/// LR4 lowpass: two cascaded Butterworth sections
#[derive(Debug, Clone)]
pub struct LinkwitzRiley {
    stages: [BiquadTDF2; 2],
    freq: f64,
}

impl LinkwitzRiley {
    pub fn lowpass(freq: f64, sample_rate: f64) -> Self {
        let freq = clamp_crossover_frequency(freq, sample_rate);
        let coeffs = BiquadCoeffs::butterworth_lowpass(freq, sample_rate);
        Self {
            stages: [BiquadTDF2::new(coeffs), BiquadTDF2::new(coeffs)],
            freq,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.freq
    }
}

impl Processor for LinkwitzRiley {
    fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}

impl MonoProcessor for LinkwitzRiley {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let [first, second] = &mut self.stages;
        second.process_sample(first.process_sample(input))
    }
}

// ============ Three-Band Crossover ============

/// Complementary three-band split
#[derive(Debug, Clone)]
pub struct ThreeBandCrossover {
    low_split: LinkwitzRiley,
    high_split: LinkwitzRiley,
}

impl ThreeBandCrossover {
    pub fn new(low_hz: f64, high_hz: f64, sample_rate: f64) -> Self {
        let (low, high) = resolve_split_points(low_hz, high_hz, sample_rate);
        Self {
            low_split: LinkwitzRiley::lowpass(low, sample_rate),
            high_split: LinkwitzRiley::lowpass(high, sample_rate),
        }
    }

    /// Split one sample into `[low, mid, high]`
    #[inline(always)]
    pub fn split(&mut self, input: Sample) -> [Sample; NUM_BANDS] {
        let low = self.low_split.process_sample(input);
        let rest = input - low;
        let mid = self.high_split.process_sample(rest);
        let high = rest - mid;
        [low, mid, high]
    }

    /// Effective split points after clamping
    pub fn split_points(&self) -> (f64, f64) {
        (self.low_split.frequency(), self.high_split.frequency())
    }
}

impl Processor for ThreeBandCrossover {
    fn reset(&mut self) {
        self.low_split.reset();
        self.high_split.reset();
    }
}
