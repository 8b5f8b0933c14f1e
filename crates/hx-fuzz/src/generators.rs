//! Input generators for fuzzing

use hx_dsp::Character;
use hx_dsp::oversampling::{OversampleFactor, OversampleQuality};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Seeded input generator
pub struct InputGenerator {
    rng: ChaCha8Rng,
    include_edge_cases: bool,
    include_boundaries: bool,
    max_frames: usize,
}

impl InputGenerator {
    /// Create a new generator with optional seed
    pub fn new(seed: Option<u64>, max_frames: usize) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_os_rng(),
        };

        Self {
            rng,
            include_edge_cases: true,
            include_boundaries: true,
            max_frames: max_frames.max(1),
        }
    }

    pub fn with_edge_cases(mut self, include: bool) -> Self {
        self.include_edge_cases = include;
        self
    }

    pub fn with_boundaries(mut self, include: bool) -> Self {
        self.include_boundaries = include;
        self
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// f64 in [-1, 1], with edge cases and boundaries mixed in
    pub fn f64(&mut self) -> f64 {
        // 20% edge cases, 10% boundaries
        if self.include_edge_cases && self.rng.random_bool(0.2) {
            return self.f64_edge_case();
        }
        if self.include_boundaries && self.rng.random_bool(0.1) {
            return self.f64_boundary();
        }
        self.rng.random::<f64>() * 2.0 - 1.0
    }

    /// f64 in `[min, max]`, occasionally an edge case
    pub fn f64_range(&mut self, min: f64, max: f64) -> f64 {
        if self.include_edge_cases && self.rng.random_bool(0.1) {
            return self.f64_edge_case();
        }
        min + self.rng.random::<f64>() * (max - min)
    }

    fn f64_edge_case(&mut self) -> f64 {
        const EDGE_CASES: [f64; 10] = [
            0.0,
            -0.0,
            f64::NAN,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::MIN,
            f64::MAX,
            f64::MIN_POSITIVE,
            f64::EPSILON,
            1e-310,
        ];
        EDGE_CASES[self.rng.random_range(0..EDGE_CASES.len())]
    }

    fn f64_boundary(&mut self) -> f64 {
        const BOUNDARIES: [f64; 10] = [-1.0, 1.0, 0.5, -0.5, 0.0, 0.999999, -0.999999, 1e-10, 1e10, -1e10];
        BOUNDARIES[self.rng.random_range(0..BOUNDARIES.len())]
    }

    /// Normalized parameter value. Boundaries and out-of-range values are
    /// mixed in to exercise clamping.
    pub fn param_value(&mut self) -> f64 {
        if self.include_boundaries && self.rng.random_bool(0.2) {
            const BOUNDARIES: [f64; 6] = [0.0, 1.0, 0.3, 0.5, -0.5, 1.5];
            return BOUNDARIES[self.rng.random_range(0..BOUNDARIES.len())];
        }
        if self.include_edge_cases && self.rng.random_bool(0.05) {
            return self.f64_edge_case();
        }
        self.rng.random::<f64>()
    }

    /// usize in `0..=max`, biased toward edge sizes
    pub fn usize(&mut self, max: usize) -> usize {
        if self.include_edge_cases && self.rng.random_bool(0.2) {
            const EDGE_CASES: [usize; 8] = [0, 1, 2, 7, 63, 64, 512, 16384];
            let edge = EDGE_CASES[self.rng.random_range(0..EDGE_CASES.len())];
            if edge <= max {
                return edge;
            }
        }
        self.rng.random_range(0..=max)
    }

    pub fn bool(&mut self) -> bool {
        self.rng.random::<bool>()
    }

    pub fn u64(&mut self) -> u64 {
        self.rng.random::<u64>()
    }

    /// Index in `0..len`
    pub fn pick(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len.max(1))
    }

    /// Samples drawn from [`f64`](Self::f64)
    pub fn audio_samples(&mut self, len: usize) -> Vec<f64> {
        (0..len).map(|_| self.f64()).collect()
    }

    /// Uniform noise in [-1, 1]
    pub fn normalized_audio(&mut self, len: usize) -> Vec<f64> {
        (0..len).map(|_| self.rng.random::<f64>() * 2.0 - 1.0).collect()
    }

    /// Log-distributed frequency from 10 Hz to just below Nyquist
    pub fn frequency(&mut self, sample_rate: f64) -> f64 {
        let log_min = 10.0_f64.ln();
        let log_max = (sample_rate * 0.49).max(20.0).ln();
        (log_min + self.rng.random::<f64>() * (log_max - log_min)).exp()
    }

    /// Host sample rate, occasionally outside the supported range
    pub fn sample_rate(&mut self) -> f64 {
        if self.include_edge_cases && self.rng.random_bool(0.1) {
            const EDGE: [f64; 5] = [0.0, 1000.0, 1e6, f64::NAN, -48000.0];
            return EDGE[self.rng.random_range(0..EDGE.len())];
        }
        const RATES: [f64; 9] = [
            8000.0, 22050.0, 44100.0, 48000.0, 88200.0, 96000.0, 176400.0, 192000.0, 384000.0,
        ];
        RATES[self.rng.random_range(0..RATES.len())]
    }

    /// Prepared block size, occasionally outside the supported range
    pub fn block_size(&mut self) -> usize {
        if self.include_edge_cases && self.rng.random_bool(0.1) {
            const EDGE: [usize; 4] = [0, 1, 7, 100_000];
            return EDGE[self.rng.random_range(0..EDGE.len())];
        }
        const SIZES: [usize; 7] = [16, 64, 128, 256, 512, 1024, 4096];
        SIZES[self.rng.random_range(0..SIZES.len())]
    }

    /// Host channel count, including zero and more than the engine processes
    pub fn channels(&mut self) -> usize {
        const COUNTS: [usize; 6] = [0, 1, 2, 2, 3, 4];
        COUNTS[self.rng.random_range(0..COUNTS.len())]
    }

    pub fn character(&mut self) -> Character {
        const ALL: [Character; 4] = [
            Character::Exciter,
            Character::Saturator,
            Character::WaveFolder,
            Character::Fuzz,
        ];
        ALL[self.rng.random_range(0..ALL.len())]
    }

    pub fn oversample_factor(&mut self) -> OversampleFactor {
        if self.bool() { OversampleFactor::X2 } else { OversampleFactor::X4 }
    }

    pub fn oversample_quality(&mut self) -> OversampleQuality {
        if self.bool() { OversampleQuality::Standard } else { OversampleQuality::High }
    }
}

/// Audio-specific input generators
pub struct AudioInputs;

impl AudioInputs {
    /// Generate a test buffer with the given pattern
    pub fn pattern_buffer(
        input_gen: &mut InputGenerator,
        len: usize,
        pattern: AudioPattern,
        sample_rate: f64,
    ) -> Vec<f64> {
        match pattern {
            AudioPattern::Silence => vec![0.0; len],
            AudioPattern::DcOffset => {
                let offset = input_gen.f64_range(-1.0, 1.0);
                vec![offset; len]
            }
            AudioPattern::Impulse => {
                let mut buf = vec![0.0; len];
                if let Some(first) = buf.first_mut() {
                    *first = 1.0;
                }
                buf
            }
            AudioPattern::Sine => {
                let freq = input_gen.frequency(sample_rate);
                let amplitude = input_gen.f64_range(0.0, 1.5);
                (0..len)
                    .map(|i| amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate).sin())
                    .collect()
            }
            AudioPattern::Noise => input_gen.normalized_audio(len),
            AudioPattern::Square => {
                let freq = input_gen.frequency(sample_rate);
                (0..len)
                    .map(|i| if (freq * i as f64 / sample_rate).fract() < 0.5 { 1.0 } else { -1.0 })
                    .collect()
            }
            AudioPattern::EdgeCases => input_gen.audio_samples(len),
            AudioPattern::Overdriven => input_gen
                .normalized_audio(len)
                .into_iter()
                .map(|x| x * 100.0)
                .collect(),
        }
    }

    /// A random pattern
    pub fn random_pattern(input_gen: &mut InputGenerator) -> AudioPattern {
        AudioPattern::ALL[input_gen.pick(AudioPattern::ALL.len())]
    }
}

/// Audio test patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioPattern {
    /// All zeros
    Silence,
    /// Constant DC offset
    DcOffset,
    /// Single impulse at start
    Impulse,
    /// Sine at a random frequency and level (up to +3.5 dBFS)
    Sine,
    /// White noise
    Noise,
    /// Square wave
    Square,
    /// Mix of edge case values including NaN and Inf
    EdgeCases,
    /// Noise at +40 dB
    Overdriven,
}

impl AudioPattern {
    pub const ALL: [AudioPattern; 8] = [
        AudioPattern::Silence,
        AudioPattern::DcOffset,
        AudioPattern::Impulse,
        AudioPattern::Sine,
        AudioPattern::Noise,
        AudioPattern::Square,
        AudioPattern::EdgeCases,
        AudioPattern::Overdriven,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_reproducibility() {
        let mut a = InputGenerator::new(Some(42), 1024);
        let mut b = InputGenerator::new(Some(42), 1024);

        for _ in 0..100 {
            let (v1, v2) = (a.f64(), b.f64());
            if v1.is_nan() {
                assert!(v2.is_nan(), "Expected NaN, got {v2}");
            } else {
                assert_eq!(v1, v2);
            }
            assert_eq!(a.block_size(), b.block_size());
            assert_eq!(a.character(), b.character());
        }
    }

    #[test]
    fn test_f64_range() {
        let mut input_gen = InputGenerator::new(Some(123), 1024).with_edge_cases(false);
        for _ in 0..1000 {
            let val = input_gen.f64_range(0.0, 1.0);
            assert!((0.0..=1.0).contains(&val), "Value {val} out of range");
        }
    }

    #[test]
    fn test_frequency_below_nyquist() {
        let mut input_gen = InputGenerator::new(Some(9), 1024);
        for _ in 0..1000 {
            let f = input_gen.frequency(8000.0);
            assert!(f > 0.0 && f < 4000.0, "{f}");
        }
    }

    #[test]
    fn test_audio_patterns() {
        let mut input_gen = InputGenerator::new(Some(456), 1024);

        let silence = AudioInputs::pattern_buffer(&mut input_gen, 100, AudioPattern::Silence, 48000.0);
        assert!(silence.iter().all(|&s| s == 0.0));

        let impulse = AudioInputs::pattern_buffer(&mut input_gen, 100, AudioPattern::Impulse, 48000.0);
        assert_eq!(impulse[0], 1.0);
        assert!(impulse[1..].iter().all(|&s| s == 0.0));

        assert!(AudioInputs::pattern_buffer(&mut input_gen, 0, AudioPattern::Impulse, 48000.0).is_empty());
    }
}
