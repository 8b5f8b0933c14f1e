//! SIMD Dispatch System
//!
//! Runtime SIMD feature detection with a cached dispatch table.
//!
//! # Design
//! - Detection happens once (first `prepare_to_play` at the latest)
//! - Dispatch table holds plain function pointers
//! - Every vectorized routine has a scalar twin and the two are tested
//!   against each other

use std::sync::OnceLock;
use wide::f64x4;

// ============ SIMD Level Detection ============

/// Detected SIMD capability level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SimdLevel {
    /// No SIMD, scalar fallback
    Scalar = 0,
    /// SSE4.2 (128-bit, 2 f64s)
    Sse42 = 1,
    /// AVX2 (256-bit, 4 f64s)
    Avx2 = 2,
    /// AVX-512 (512-bit, 8 f64s)
    Avx512 = 3,
    /// ARM NEON (128-bit, 2 f64s)
    Neon = 4,
}

impl SimdLevel {
    /// Get the SIMD width in f64 elements
    pub const fn width(self) -> usize {
        match self {
            SimdLevel::Scalar => 1,
            SimdLevel::Sse42 | SimdLevel::Neon => 2,
            SimdLevel::Avx2 => 4,
            SimdLevel::Avx512 => 8,
        }
    }

    /// Get human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            SimdLevel::Scalar => "Scalar",
            SimdLevel::Sse42 => "SSE4.2",
            SimdLevel::Avx2 => "AVX2",
            SimdLevel::Avx512 => "AVX-512",
            SimdLevel::Neon => "NEON",
        }
    }
}

/// Global SIMD level detection (computed once)
static DETECTED_SIMD_LEVEL: OnceLock<SimdLevel> = OnceLock::new();

/// Detect the best available SIMD level
pub fn detect_simd_level() -> SimdLevel {
    *DETECTED_SIMD_LEVEL.get_or_init(|| {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx512f") && is_x86_feature_detected!("avx512dq") {
                return SimdLevel::Avx512;
            }
            if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
                return SimdLevel::Avx2;
            }
            if is_x86_feature_detected!("sse4.2") {
                return SimdLevel::Sse42;
            }
            SimdLevel::Scalar
        }

        #[cfg(target_arch = "aarch64")]
        {
            // NEON is always available on aarch64
            SimdLevel::Neon
        }

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            SimdLevel::Scalar
        }
    })
}

/// Get the current SIMD level (cached)
#[inline]
pub fn simd_level() -> SimdLevel {
    detect_simd_level()
}

// ============ Dispatch Table ============

/// Function pointer type for FIR tap sums
pub type DotFn = fn(&[f64], &[f64]) -> f64;

/// Dispatch table for the hot FIR kernels
pub struct DspDispatch {
    /// Dot product of two equal-length slices
    pub dot: DotFn,
    /// SIMD level used
    pub level: SimdLevel,
}

impl DspDispatch {
    /// Get the global dispatch table
    pub fn get() -> &'static Self {
        static DISPATCH: OnceLock<DspDispatch> = OnceLock::new();
        DISPATCH.get_or_init(|| Self::new(detect_simd_level()))
    }

    /// Create dispatch table for specific SIMD level
    pub fn new(level: SimdLevel) -> Self {
        match level {
            SimdLevel::Scalar => Self {
                dot: dot_scalar,
                level,
            },
            _ => Self {
                dot: dot_f64x4,
                level,
            },
        }
    }
}

// ============ Implementations ============

/// Scalar dot product with four partial sums
pub fn dot_scalar(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let mut acc = [0.0; 4];
    let mut chunks_a = a.chunks_exact(4);
    let mut chunks_b = b.chunks_exact(4);
    for (ca, cb) in (&mut chunks_a).zip(&mut chunks_b) {
        acc[0] += ca[0] * cb[0];
        acc[1] += ca[1] * cb[1];
        acc[2] += ca[2] * cb[2];
        acc[3] += ca[3] * cb[3];
    }

    let tail: f64 = chunks_a
        .remainder()
        .iter()
        .zip(chunks_b.remainder())
        .map(|(x, y)| x * y)
        .sum();

    (acc[0] + acc[1]) + (acc[2] + acc[3]) + tail
}

#[inline(always)]
fn lanes(c: &[f64]) -> f64x4 {
    f64x4::from([c[0], c[1], c[2], c[3]])
}

/// Vectorized dot product over `f64x4` lanes, two accumulators deep
pub fn dot_f64x4(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let mut acc0 = f64x4::from([0.0; 4]);
    let mut acc1 = f64x4::from([0.0; 4]);
    let mut chunks_a = a.chunks_exact(8);
    let mut chunks_b = b.chunks_exact(8);
    for (ca, cb) in (&mut chunks_a).zip(&mut chunks_b) {
        acc0 += lanes(&ca[..4]) * lanes(&cb[..4]);
        acc1 += lanes(&ca[4..]) * lanes(&cb[4..]);
    }

    let (mut rest_a, mut rest_b) = (chunks_a.remainder(), chunks_b.remainder());
    if rest_a.len() >= 4 {
        acc0 += lanes(rest_a) * lanes(rest_b);
        rest_a = &rest_a[4..];
        rest_b = &rest_b[4..];
    }
    let tail: f64 = rest_a.iter().zip(rest_b).map(|(x, y)| x * y).sum();

    let sums = (acc0 + acc1).to_array();
    (sums[0] + sums[1]) + (sums[2] + sums[3]) + tail
}

// ============ Convenience Functions ============

/// Dot product using best available SIMD
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    (DspDispatch::get().dot)(a, b)
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize, scale: f64) -> Vec<f64> {
        (0..len).map(|i| ((i as f64) * scale).sin()).collect()
    }

    #[test]
    fn test_simd_detection() {
        let level = detect_simd_level();
        println!("Detected SIMD level: {:?} ({})", level, level.name());
        assert!(level.width() >= 1);
        assert_eq!(DspDispatch::get().level, level);
    }

    #[test]
    fn test_dot_scalar_known_value() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 2.0, 2.0, 2.0, 2.0];
        assert_eq!(dot_scalar(&a, &b), 30.0);
    }

    #[test]
    fn test_dot_vector_matches_scalar() {
        for len in [0, 1, 3, 4, 7, 8, 12, 15, 64, 127, 256] {
            let a = ramp(len, 0.37);
            let b = ramp(len, 0.11);
            let s = dot_scalar(&a, &b);
            let v = dot_f64x4(&a, &b);
            assert!((s - v).abs() < 1e-12, "len {len}: scalar {s} vs simd {v}");
        }
    }

    #[test]
    fn test_dispatch_tables_agree() {
        let a = ramp(96, 0.5);
        let b = ramp(96, 0.25);
        let scalar = (DspDispatch::new(SimdLevel::Scalar).dot)(&a, &b);
        let wide = (DspDispatch::new(SimdLevel::Avx2).dot)(&a, &b);
        assert!((scalar - wide).abs() < 1e-12);
        assert!((dot(&a, &b) - scalar).abs() < 1e-12);
    }

    #[test]
    fn test_dot_uses_shorter_length() {
        let a = [1.0, 1.0, 1.0];
        let b = [1.0, 1.0];
        assert_eq!(dot_f64x4(&a, &b), 2.0);
        assert_eq!(dot_scalar(&a, &b), 2.0);
    }
}
