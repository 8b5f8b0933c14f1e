//! Per-band nonlinear stage with gated oversampling
//!
//! Each band always runs a latency-matched direct path. The oversampled
//! path only runs while the band is driven past the gate threshold, and
//! switching between the two goes through a warm-up and a crossfade:
//!
//! ```text
//! Off -> WarmingUp -> FadingIn -> On -> FadingOut -> Off
//! ```
//!
//! During warm-up the oversampler runs with its output discarded so the
//! FIR histories hold real signal before the crossfade starts.

use hx_core::Sample;

use crate::config::EngineConfig;
use crate::delay::LatencyDelay;
use crate::harmonic::HarmonicGenerator;
use crate::oversampling::Oversampler;
use crate::{MonoProcessor, Processor};

/// Oversampling gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Off,
    WarmingUp,
    FadingIn,
    On,
    FadingOut,
}

/// Gated oversampling + waveshaping for one band of one channel
#[derive(Debug, Clone)]
pub struct BandProcessor {
    generator: HarmonicGenerator,
    oversampler: Oversampler,
    delay: LatencyDelay,
    state: GateState,
    threshold: f64,
    warmup_len: usize,
    warmup_remaining: usize,
    /// Weight of the oversampled path, 0..=1
    fade: f64,
    fade_step: f64,
}

impl BandProcessor {
    pub fn new(config: &EngineConfig, sample_rate: f64) -> Self {
        let oversampler = Oversampler::new(config.oversample_factor, config.oversample_quality);
        let crossfade_samples = (config.crossfade_ms.max(0.0) * 0.001 * sample_rate).round();
        let threshold = if config.oversample_threshold.is_nan() {
            1.0
        } else {
            config.oversample_threshold.clamp(0.0, 1.0)
        };

        Self {
            generator: HarmonicGenerator::new(config.character.pair()),
            delay: LatencyDelay::new(oversampler.latency()),
            warmup_len: 2 * oversampler.taps_per_phase(),
            oversampler,
            state: GateState::Off,
            threshold,
            warmup_remaining: 0,
            fade: 0.0,
            fade_step: 1.0 / crossfade_samples.max(1.0),
        }
    }

    /// Update the gate from this block's drive. Called once per block.
    pub fn update_gate(&mut self, block_drive: f64) {
        let engaged = block_drive > self.threshold;
        self.state = match (self.state, engaged) {
            (GateState::Off, true) => {
                Processor::reset(&mut self.oversampler);
                self.warmup_remaining = self.warmup_len;
                self.fade = 0.0;
                GateState::WarmingUp
            }
            (GateState::WarmingUp, false) => GateState::Off,
            (GateState::FadingIn | GateState::On, false) => GateState::FadingOut,
            (GateState::FadingOut, true) => GateState::FadingIn,
            (state, _) => state,
        };
    }

    /// Thermal bias for this block
    #[inline]
    pub fn set_bias_offset(&mut self, offset: f64) {
        self.generator.set_bias_offset(offset);
    }

    /// Shape one base-rate sample
    #[inline]
    pub fn process_sample(&mut self, input: Sample, drive: f64, color: f64) -> Sample {
        let delayed = self.delay.process_sample(input);
        let shaper = self.generator.at(drive, color);

        let oversampled = match self.state {
            GateState::Off => return shaper.process(delayed),
            _ => self.oversampler.process_with(input, |x| shaper.process(x)),
        };

        match self.state {
            GateState::On => oversampled,
            GateState::FadingIn | GateState::FadingOut => {
                let direct = shaper.process(delayed);
                let out = direct + (oversampled - direct) * self.fade;
                self.advance_fade();
                out
            }
            GateState::Off | GateState::WarmingUp => {
                self.warmup_remaining = self.warmup_remaining.saturating_sub(1);
                if self.warmup_remaining == 0 {
                    self.state = GateState::FadingIn;
                }
                shaper.process(delayed)
            }
        }
    }

    #[inline]
    fn advance_fade(&mut self) {
        if self.state == GateState::FadingIn {
            self.fade += self.fade_step;
            if self.fade >= 1.0 {
                self.fade = 1.0;
                self.state = GateState::On;
            }
        } else {
            self.fade -= self.fade_step;
            if self.fade <= 0.0 {
                self.fade = 0.0;
                self.state = GateState::Off;
            }
        }
    }

    #[inline]
    pub fn state(&self) -> GateState {
        self.state
    }

    /// True whenever the oversampler is running
    #[inline]
    pub fn is_oversampling(&self) -> bool {
        self.state != GateState::Off
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Weight of the oversampled path
    pub fn fade(&self) -> f64 {
        self.fade
    }
}

impl Processor for BandProcessor {
    fn reset(&mut self) {
        Processor::reset(&mut self.oversampler);
        self.delay.reset();
        self.state = GateState::Off;
        self.warmup_remaining = 0;
        self.fade = 0.0;
    }

    fn latency(&self) -> usize {
        self.oversampler.latency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn band() -> BandProcessor {
        BandProcessor::new(&EngineConfig::default(), 48000.0)
    }

    fn run(band: &mut BandProcessor, n: usize, drive: f64) -> Vec<f64> {
        band.update_gate(drive);
        (0..n)
            .map(|i| {
                let x = 0.25 * (2.0 * PI * 1000.0 * i as f64 / 48000.0).sin();
                band.process_sample(x, drive, 0.0)
            })
            .collect()
    }

    #[test]
    fn test_stays_off_below_threshold() {
        let mut b = band();
        run(&mut b, 512, 0.25);
        assert_eq!(b.state(), GateState::Off);
        assert!(!b.is_oversampling());
    }

    #[test]
    fn test_full_cycle() {
        let mut b = band();
        run(&mut b, 64, 0.5);
        assert_eq!(b.state(), GateState::WarmingUp);

        // warm-up is 128 samples, the 5 ms crossfade is 240
        run(&mut b, 512, 0.5);
        assert_eq!(b.state(), GateState::On);
        assert_eq!(b.fade(), 1.0);

        run(&mut b, 64, 0.1);
        assert_eq!(b.state(), GateState::FadingOut);
        run(&mut b, 512, 0.1);
        assert_eq!(b.state(), GateState::Off);
    }

    #[test]
    fn test_disengage_during_warmup() {
        let mut b = band();
        run(&mut b, 16, 0.9);
        assert_eq!(b.state(), GateState::WarmingUp);
        b.update_gate(0.0);
        assert_eq!(b.state(), GateState::Off);
    }

    #[test]
    fn test_reengage_while_fading_out() {
        let mut b = band();
        run(&mut b, 1024, 0.9);
        run(&mut b, 32, 0.0);
        assert_eq!(b.state(), GateState::FadingOut);
        let fade = b.fade();
        b.update_gate(0.9);
        assert_eq!(b.state(), GateState::FadingIn);
        assert_eq!(b.fade(), fade);
    }

    #[test]
    fn test_threshold_one_never_engages() {
        let config = EngineConfig {
            oversample_threshold: 1.0,
            ..EngineConfig::default()
        };
        let mut b = BandProcessor::new(&config, 48000.0);
        run(&mut b, 256, 1.0);
        assert!(!b.is_oversampling());
    }

    #[test]
    fn test_paths_time_aligned() {
        // drive 0: both paths are the identity delayed by the same latency
        let mut b = band();
        let input: Vec<f64> = (0..2048)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f64 / 48000.0).sin())
            .collect();
        let latency = Processor::latency(&b);

        b.update_gate(0.0);
        let direct: Vec<f64> = input.iter().map(|&x| b.process_sample(x, 0.0, 0.0)).collect();
        for i in latency..input.len() {
            assert_eq!(direct[i], input[i - latency]);
        }

        // force the oversampled path on and compare after it settles
        let mut os = band();
        os.update_gate(1.0);
        let mut out = Vec::with_capacity(input.len());
        for &x in &input {
            out.push(os.process_sample(x, 0.0, 0.0));
        }
        assert_eq!(os.state(), GateState::On);
        for i in 1024..input.len() {
            assert!((out[i] - input[i - latency]).abs() < 1e-4);
        }
    }
}
