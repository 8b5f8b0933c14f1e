//! Parameter types for audio processors

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Parameter ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamId(pub u32);

/// Parameter value (normalized 0.0-1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedValue(f64);

impl NormalizedValue {
    pub const ZERO: Self = Self(0.0);

    /// NaN maps to zero, everything else is clamped
    #[inline]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self::ZERO
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    /// Map to a range
    #[inline]
    pub fn map(self, min: f64, max: f64) -> f64 {
        min + self.0 * (max - min)
    }
}

/// Atomic parameter for lock-free access
#[derive(Debug)]
pub struct AtomicParam {
    bits: AtomicU64,
}

impl AtomicParam {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Parameter range specification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl ParamRange {
    pub const fn linear(min: f64, max: f64, default: f64) -> Self {
        Self { min, max, default }
    }

    /// The `[0, 1]` range every engine parameter uses
    pub const fn unit(default: f64) -> Self {
        Self::linear(0.0, 1.0, default)
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    #[inline]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Denormalize a 0-1 value to actual value
    #[inline]
    pub fn denormalize(&self, normalized: f64) -> f64 {
        self.min + normalized.clamp(0.0, 1.0) * self.span()
    }

    /// Normalize an actual value to 0-1
    #[inline]
    pub fn normalize(&self, value: f64) -> f64 {
        if self.span() <= 0.0 {
            return 0.0;
        }
        (self.clamp(value) - self.min) / self.span()
    }
}

/// Static description of one engine parameter
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParamInfo {
    pub id: ParamId,
    pub name: &'static str,
    pub range: ParamRange,
}

/// Range-clamped atomic target.
///
/// Written from any thread; read once per block by the audio thread.
#[derive(Debug)]
pub struct ParamTarget {
    value: AtomicParam,
    range: ParamRange,
}

impl ParamTarget {
    pub fn new(range: ParamRange) -> Self {
        Self {
            value: AtomicParam::new(range.clamp(range.default)),
            range,
        }
    }

    /// Store a new target. Out-of-range values are clamped, NaN is dropped.
    #[inline]
    pub fn set(&self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.value.set(self.range.clamp(value));
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.value.get()
    }

    #[inline]
    pub fn range(&self) -> &ParamRange {
        &self.range
    }

    pub fn reset_to_default(&self) {
        self.value.set(self.range.clamp(self.range.default));
    }
}
