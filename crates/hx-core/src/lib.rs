//! hx-core: Shared types for the harmonic exciter engine
//!
//! Sample types, supported processing ranges, parameter plumbing
//! and the error type used off the audio path.

mod error;
mod params;
mod sample;

pub use error::*;
pub use params::*;
pub use sample::*;

/// Lowest sample rate the engine prepares for
pub const MIN_SAMPLE_RATE: f64 = 8_000.0;

/// Highest sample rate the engine prepares for
pub const MAX_SAMPLE_RATE: f64 = 384_000.0;

/// Largest block the engine will pre-allocate for
pub const MAX_BLOCK_SIZE: usize = 16_384;

/// Channels processed per engine instance (stereo)
pub const MAX_CHANNELS: usize = 2;

/// Clamp a host sample rate into the supported range.
///
/// Non-finite rates fall back to 48 kHz.
#[inline]
pub fn clamp_sample_rate(sample_rate: f64) -> f64 {
    if sample_rate.is_finite() {
        sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE)
    } else {
        48_000.0
    }
}

/// Clamp a host block size into `1..=MAX_BLOCK_SIZE`
#[inline]
pub fn clamp_block_size(block_size: usize) -> usize {
    block_size.clamp(1, MAX_BLOCK_SIZE)
}

/// Decibel value wrapper
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Decibels(pub f64);

impl Decibels {
    pub const NEG_INF: Self = Self(f64::NEG_INFINITY);

    #[inline]
    pub fn from_gain(gain: f64) -> Self {
        if gain <= 0.0 {
            Self::NEG_INF
        } else {
            Self(20.0 * gain.log10())
        }
    }

    #[inline]
    pub fn to_gain(self) -> f64 {
        if self.0 <= -144.0 {
            0.0
        } else {
            10.0_f64.powf(self.0 / 20.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_decibels_roundtrip_unity() {
        assert_abs_diff_eq!(Decibels(0.0).to_gain(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(Decibels(6.0).to_gain(), 1.9953, epsilon = 1e-4);
        assert_eq!(Decibels::from_gain(0.0), Decibels::NEG_INF);
        assert_eq!(Decibels(-200.0).to_gain(), 0.0);
    }

    #[test]
    fn test_sample_rate_clamping() {
        assert_eq!(clamp_sample_rate(1000.0), MIN_SAMPLE_RATE);
        assert_eq!(clamp_sample_rate(1e9), MAX_SAMPLE_RATE);
        assert_eq!(clamp_sample_rate(44_100.0), 44_100.0);
        assert_eq!(clamp_sample_rate(f64::NAN), 48_000.0);
    }

    #[test]
    fn test_block_size_clamping() {
        assert_eq!(clamp_block_size(0), 1);
        assert_eq!(clamp_block_size(512), 512);
        assert_eq!(clamp_block_size(1 << 20), MAX_BLOCK_SIZE);
    }
}
