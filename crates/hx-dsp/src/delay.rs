//! Latency compensation delay
//!
//! Fixed integer delay used to keep the non-oversampled band path and the
//! dry path time-aligned with the oversampled path.

use hx_core::Sample;

use crate::{MonoProcessor, Processor};

/// Circular buffer delay line with a fixed delay set at construction
#[derive(Debug, Clone)]
pub struct LatencyDelay {
    buffer: Vec<Sample>,
    write_pos: usize,
    delay_samples: usize,
}

impl LatencyDelay {
    /// Allocates; call at prepare time
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples + 1],
            write_pos: 0,
            delay_samples,
        }
    }

    #[inline]
    pub fn delay(&self) -> usize {
        self.delay_samples
    }
}

impl Processor for LatencyDelay {
    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    fn latency(&self) -> usize {
        self.delay_samples
    }
}

impl MonoProcessor for LatencyDelay {
    #[inline]
    fn process_sample(&mut self, input: Sample) -> Sample {
        if self.delay_samples == 0 {
            return input;
        }

        let buffer_len = self.buffer.len();
        self.buffer[self.write_pos] = input;
        self.write_pos += 1;
        if self.write_pos == buffer_len {
            self.write_pos = 0;
        }
        // after the write, the oldest slot holds the sample from `delay` ago
        self.buffer[self.write_pos]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_delay_passthrough() {
        let mut d = LatencyDelay::new(0);
        assert_eq!(d.process_sample(0.7), 0.7);
    }

    #[test]
    fn test_impulse_delayed_exactly() {
        let mut d = LatencyDelay::new(63);
        let out: Vec<f64> = (0..100)
            .map(|i| d.process_sample(if i == 0 { 1.0 } else { 0.0 }))
            .collect();
        assert_eq!(out[63], 1.0);
        assert_eq!(out.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn test_reset() {
        let mut d = LatencyDelay::new(4);
        for _ in 0..4 {
            d.process_sample(1.0);
        }
        d.reset();
        for _ in 0..8 {
            assert_eq!(d.process_sample(0.0), 0.0);
        }
    }
}
