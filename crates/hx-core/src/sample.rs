//! Sample types and host I/O conversion

/// Type alias for audio samples (always f64 internally)
pub type Sample = f64;

/// Host-facing sample format.
///
/// The engine computes in `f64`; hosts hand it `f32` or `f64` buffers.
pub trait IoSample: Copy + Send + Sync + 'static {
    fn to_sample(self) -> Sample;
    fn from_sample(sample: Sample) -> Self;
}

impl IoSample for f32 {
    #[inline(always)]
    fn to_sample(self) -> Sample {
        self as Sample
    }

    #[inline(always)]
    fn from_sample(sample: Sample) -> Self {
        sample as f32
    }
}

impl IoSample for f64 {
    #[inline(always)]
    fn to_sample(self) -> Sample {
        self
    }

    #[inline(always)]
    fn from_sample(sample: Sample) -> Self {
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_conversion() {
        let s = 0.25_f32.to_sample();
        assert_eq!(s, 0.25);
        assert_eq!(f32::from_sample(0.5), 0.5_f32);
    }

    #[test]
    fn test_f64_passthrough() {
        assert_eq!(f64::from_sample(0.123_456_789), 0.123_456_789);
    }
}
