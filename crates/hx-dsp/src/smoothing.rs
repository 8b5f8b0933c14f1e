//! Lock-Free Parameter Smoothing
//!
//! Provides click-free parameter changes with:
//! - Atomic targets shared with control threads (`Arc<ParamTarget>`)
//! - One-pole exponential smoothing, per sample or per block in closed form
//! - Linear per-sample ramps for values derived once per block
//!
//! # Design
//! Targets are written from any thread and clamped at write time. The smoothed
//! current value lives on the audio thread only; no locks, no allocation.

use std::sync::Arc;

use hx_core::{ParamRange, ParamTarget};

use crate::denormal::flush_denormal;

/// Remaining distance at which the current value lands exactly on the target
const SNAP_EPSILON: f64 = 1e-12;

// ============ Parameter Smoother ============

/// One-pole smoothed parameter.
///
/// `current += (target - current) * (1 - coeff)` per sample.
#[derive(Debug)]
pub struct ParameterSmoother {
    target: Arc<ParamTarget>,
    current: f64,
    /// Per-sample decay; 0 means instant
    coeff: f64,
    smoothing_ms: f64,
    sample_rate: f64,
}

impl ParameterSmoother {
    /// Smoother reading from a shared target
    pub fn new(target: Arc<ParamTarget>, smoothing_ms: f64, sample_rate: f64) -> Self {
        let current = target.get();
        let mut smoother = Self {
            target,
            current,
            coeff: 0.0,
            smoothing_ms: 0.0,
            sample_rate,
        };
        smoother.set_smoothing_time(smoothing_ms, sample_rate);
        smoother
    }

    /// Smoother owning a fresh target for `range`
    pub fn with_range(range: ParamRange, smoothing_ms: f64, sample_rate: f64) -> Self {
        Self::new(Arc::new(ParamTarget::new(range)), smoothing_ms, sample_rate)
    }

    /// `coeff = exp(-1 / (ms * 0.001 * sr))`
    fn calculate_coeff(smoothing_ms: f64, sample_rate: f64) -> f64 {
        let samples = smoothing_ms * 0.001 * sample_rate;
        if samples > 0.0 && samples.is_finite() {
            (-1.0 / samples).exp()
        } else {
            0.0
        }
    }

    /// Set smoothing time in milliseconds. 0 ms (or anything non-positive) is instant.
    pub fn set_smoothing_time(&mut self, smoothing_ms: f64, sample_rate: f64) {
        self.smoothing_ms = if smoothing_ms.is_finite() { smoothing_ms.max(0.0) } else { 0.0 };
        self.sample_rate = sample_rate;
        self.coeff = Self::calculate_coeff(self.smoothing_ms, sample_rate);
    }

    /// Set target value (thread-safe, clamped, NaN ignored)
    #[inline]
    pub fn set_target(&self, value: f64) {
        self.target.set(value);
    }

    /// Set target and jump the current value to it
    pub fn set_immediate(&mut self, value: f64) {
        self.target.set(value);
        self.snap();
    }

    /// Jump the current value to the target
    #[inline]
    pub fn snap(&mut self) {
        self.current = self.target.get();
    }

    /// Advance one sample
    #[inline]
    pub fn tick(&mut self) -> f64 {
        let target = self.target.get();
        let next = target + (self.current - target) * self.coeff;
        self.current = Self::settle(next, target);
        self.current
    }

    /// Advance `n` samples at once: `current = target + (current - target) * coeff^n`
    #[inline]
    pub fn update_block(&mut self, n: usize) -> f64 {
        if n == 0 {
            return self.current;
        }
        let target = self.target.get();
        let decay = self.coeff.powi(n.min(i32::MAX as usize) as i32);
        let next = target + (self.current - target) * decay;
        self.current = Self::settle(next, target);
        self.current
    }

    #[inline(always)]
    fn settle(value: f64, target: f64) -> f64 {
        if (value - target).abs() < SNAP_EPSILON {
            target
        } else {
            flush_denormal(value)
        }
    }

    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.target.get()
    }

    /// The shared target, for control handles
    pub fn shared_target(&self) -> Arc<ParamTarget> {
        Arc::clone(&self.target)
    }

    #[inline]
    pub fn coeff(&self) -> f64 {
        self.coeff
    }

    pub fn smoothing_ms(&self) -> f64 {
        self.smoothing_ms
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Largest per-sample change this smoother can produce over a range of `span`
    #[inline]
    pub fn max_step_per_sample(&self, span: f64) -> f64 {
        span.abs() * (1.0 - self.coeff)
    }

    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.current != self.target.get()
    }
}

// ============ Block Ramp ============

/// Linear per-sample interpolation across one block.
///
/// Values derived from smoothed parameters are computed at block edges and
/// ramped, so sample `i` (1-based) of an `n`-sample block reads
/// `start + (end - start) * i / n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockRamp {
    value: f64,
    step: f64,
    end: f64,
}

impl BlockRamp {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            step: 0.0,
            end: value,
        }
    }

    /// Start a ramp from `start` to `end` over `n` samples
    #[inline]
    pub fn begin(&mut self, start: f64, end: f64, n: usize) {
        self.value = start;
        self.end = end;
        self.step = if n > 0 { (end - start) / n as f64 } else { 0.0 };
        if n == 0 {
            self.value = end;
        }
    }

    /// Jump to `value` with no ramp
    #[inline]
    pub fn set(&mut self, value: f64) {
        self.value = value;
        self.end = value;
        self.step = 0.0;
    }

    /// Advance one sample and return the new value
    #[inline(always)]
    pub fn next_value(&mut self) -> f64 {
        self.value += self.step;
        self.value
    }

    /// Land exactly on the block's end value
    #[inline]
    pub fn finish(&mut self) {
        self.value = self.end;
        self.step = 0.0;
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.end
    }

    #[inline]
    pub fn step(&self) -> f64 {
        self.step
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.step == 0.0
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn smoother(default: f64, ms: f64) -> ParameterSmoother {
        ParameterSmoother::with_range(ParamRange::unit(default), ms, 48000.0)
    }

    #[test]
    fn test_coeff_formula() {
        let s = smoother(0.0, 20.0);
        assert_relative_eq!(s.coeff(), (-1.0f64 / 960.0).exp(), epsilon = 1e-15);

        let instant = smoother(0.0, 0.0);
        assert_eq!(instant.coeff(), 0.0);
    }

    #[test]
    fn test_zero_time_is_instant() {
        let mut s = smoother(0.0, 0.0);
        s.set_target(0.7);
        assert_eq!(s.tick(), 0.7);
    }

    #[test]
    fn test_monotonic_convergence() {
        let mut s = smoother(0.0, 10.0);
        s.set_target(1.0);
        assert!(s.is_smoothing());
        let mut last = s.current();
        for _ in 0..48000 {
            let v = s.tick();
            assert!(v >= last, "smoother went backwards: {v} < {last}");
            assert!(v <= 1.0);
            last = v;
        }
        assert_eq!(last, 1.0);
        assert!(!s.is_smoothing());
    }

    #[test]
    fn test_update_block_matches_ticks() {
        let mut a = smoother(0.2, 20.0);
        let mut b = smoother(0.2, 20.0);
        a.set_target(0.9);
        b.set_target(0.9);
        for _ in 0..512 {
            a.tick();
        }
        let block = b.update_block(512);
        assert_relative_eq!(a.current(), block, epsilon = 1e-12);
    }

    #[test]
    fn test_target_clamped_and_nan_ignored() {
        let mut s = smoother(0.5, 0.0);
        s.set_target(3.0);
        assert_eq!(s.target(), 1.0);
        s.set_target(f64::NAN);
        assert_eq!(s.target(), 1.0);
        s.set_immediate(0.25);
        assert_eq!(s.current(), 0.25);
    }

    #[test]
    fn test_shared_target_visible() {
        let mut s = smoother(0.0, 0.0);
        let handle = s.shared_target();
        std::thread::spawn(move || handle.set(0.4))
            .join()
            .expect("control thread");
        assert_eq!(s.update_block(64), 0.4);
    }

    #[test]
    fn test_step_bound() {
        let mut s = smoother(0.0, 20.0);
        s.set_target(1.0);
        let bound = s.max_step_per_sample(1.0);
        let mut last = s.current();
        for _ in 0..1000 {
            let v = s.tick();
            assert!(v - last <= bound + 1e-15);
            last = v;
        }
    }

    #[test]
    fn test_block_ramp_reaches_end() {
        let mut ramp = BlockRamp::new(0.0);
        ramp.begin(0.0, 1.0, 4);
        let values: Vec<f64> = (0..4).map(|_| ramp.next_value()).collect();
        assert_relative_eq!(values[0], 0.25);
        assert_relative_eq!(values[3], 1.0);
        ramp.finish();
        assert_eq!(ramp.value(), 1.0);
        assert!(ramp.is_constant());
    }

    #[test]
    fn test_block_ramp_step_within_smoother_bound() {
        let mut s = smoother(0.0, 20.0);
        s.set_target(1.0);
        let bound = s.max_step_per_sample(1.0);
        let mut ramp = BlockRamp::new(s.current());
        for n in [1usize, 7, 64, 512, 4096] {
            let start = s.current();
            let end = s.update_block(n);
            ramp.begin(start, end, n);
            assert!(ramp.step().abs() <= bound + 1e-15, "n={n}");
        }
    }
}
