//! Thermal drift model
//!
//! Slow, seeded random walk that nudges the tube bias the way a warming
//! circuit drifts. Advanced once per block; bit-identical for the same seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::ThermalConfig;

/// Offset per unit of `amount` at full deflection
pub const THERMAL_SCALE: f64 = 0.05;

/// Mean time between new drift targets, seconds
pub const RETARGET_SECONDS: f64 = 0.5;

/// Relaxation time constant toward the current target, seconds
pub const TIME_CONSTANT_SECONDS: f64 = 2.0;

/// Per-channel drift source
#[derive(Debug, Clone)]
pub struct ThermalModel {
    rng: ChaCha8Rng,
    seed: u64,
    enabled: bool,
    amount: f64,
    sample_rate: f64,
    /// Normalized deflection in [-1, 1]
    state: f64,
    target: f64,
    until_retarget: usize,
}

impl ThermalModel {
    pub fn new(config: &ThermalConfig, channel: usize, sample_rate: f64) -> Self {
        let seed = config.seed.wrapping_add(channel as u64);
        let mut model = Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            enabled: config.enabled,
            amount: if config.amount.is_finite() { config.amount.clamp(0.0, 1.0) } else { 0.0 },
            sample_rate,
            state: 0.0,
            target: 0.0,
            until_retarget: 0,
        };
        model.reset();
        model
    }

    /// Re-seed and return to the initial state
    pub fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.state = 0.0;
        self.target = 0.0;
        self.until_retarget = 0;
    }

    /// Advance `n` samples and return the new bias offset
    pub fn advance(&mut self, n: usize) -> f64 {
        if !self.enabled || n == 0 {
            return self.offset();
        }

        let mut remaining = n;
        while remaining > 0 {
            if self.until_retarget == 0 {
                self.target = self.rng.random_range(-1.0..=1.0);
                let interval = RETARGET_SECONDS * self.rng.random_range(0.5..1.5);
                self.until_retarget = ((interval * self.sample_rate) as usize).max(1);
            }
            let step = remaining.min(self.until_retarget);
            let decay = (-(step as f64) / (TIME_CONSTANT_SECONDS * self.sample_rate)).exp();
            self.state = self.target + (self.state - self.target) * decay;
            self.until_retarget -= step;
            remaining -= step;
        }
        self.offset()
    }

    /// Current bias offset; exactly 0 when disabled
    #[inline]
    pub fn offset(&self) -> f64 {
        if self.enabled {
            self.state * self.amount * THERMAL_SCALE
        } else {
            0.0
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, seed: u64) -> ThermalConfig {
        ThermalConfig {
            enabled,
            amount: 1.0,
            seed,
        }
    }

    fn run(model: &mut ThermalModel, blocks: usize) -> Vec<f64> {
        (0..blocks).map(|_| model.advance(512)).collect()
    }

    #[test]
    fn test_disabled_is_exact_zero() {
        let mut model = ThermalModel::new(&config(false, 7), 0, 48000.0);
        assert!(run(&mut model, 500).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_same_seed_same_drift() {
        let mut a = ThermalModel::new(&config(true, 42), 0, 48000.0);
        let mut b = ThermalModel::new(&config(true, 42), 0, 48000.0);
        assert_eq!(run(&mut a, 300), run(&mut b, 300));
    }

    #[test]
    fn test_channels_drift_independently() {
        let mut left = ThermalModel::new(&config(true, 42), 0, 48000.0);
        let mut right = ThermalModel::new(&config(true, 42), 1, 48000.0);
        assert_ne!(run(&mut left, 300), run(&mut right, 300));
    }

    #[test]
    fn test_drift_bounded_and_moving() {
        let mut model = ThermalModel::new(&config(true, 3), 0, 48000.0);
        let values = run(&mut model, 2000);
        assert!(values.iter().all(|v| v.abs() <= THERMAL_SCALE));
        assert!(values.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_reset_replays() {
        let mut model = ThermalModel::new(&config(true, 9), 0, 48000.0);
        let first = run(&mut model, 100);
        model.reset();
        assert_eq!(first, run(&mut model, 100));
    }
}
