//! Engine configuration
//!
//! Structural settings fixed at `prepare_to_play` time. Everything here is
//! serializable; missing JSON fields take their defaults.

use std::path::Path;

use hx_core::{HxError, HxResult};
use serde::{Deserialize, Serialize};

use crate::crossover::{
    DEFAULT_HIGH_CROSSOVER_HZ, DEFAULT_LOW_CROSSOVER_HZ, MIN_CROSSOVER_HZ, MIN_SPLIT_RATIO,
};
use crate::dc_blocker::DEFAULT_DC_CUTOFF_HZ;
use crate::harmonic::{CurveModel, ShaperPair};
use crate::oversampling::{OversampleFactor, OversampleQuality};

// ============ Limits ============

/// Upper bound for split frequencies before sample-rate clamping
pub const MAX_CROSSOVER_HZ: f64 = 40_000.0;

/// Longest accepted gate crossfade
pub const MAX_CROSSFADE_MS: f64 = 100.0;

/// Longest accepted smoothing time
pub const MAX_SMOOTHING_MS: f64 = 1_000.0;

/// DC blocker corner range
pub const DC_CUTOFF_RANGE: (f64, f64) = (1.0, 200.0);

// ============ Character ============

/// Curve pairing preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Character {
    /// Tube / transistor
    #[default]
    Exciter,
    /// Tape / tube
    Saturator,
    /// Tape / wavefolder
    WaveFolder,
    /// Diode / transistor
    Fuzz,
}

impl Character {
    pub const fn pair(self) -> ShaperPair {
        match self {
            Character::Exciter => ShaperPair::new(CurveModel::Tube, CurveModel::Transistor),
            Character::Saturator => ShaperPair::new(CurveModel::Tape, CurveModel::Tube),
            Character::WaveFolder => ShaperPair::new(CurveModel::Tape, CurveModel::Fold),
            Character::Fuzz => ShaperPair::new(CurveModel::Diode, CurveModel::Transistor),
        }
    }
}

// ============ Thermal ============

/// Thermal drift settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    pub enabled: bool,
    /// Drift depth in [0, 1]
    pub amount: f64,
    /// Channel `n` uses `seed + n`
    pub seed: u64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            amount: 0.2,
            seed: 0x5EED,
        }
    }
}

impl ThermalConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

// ============ Engine Config ============

/// Structural engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub low_crossover_hz: f64,
    pub high_crossover_hz: f64,
    /// 4x doubles the shaping and filtering cost of every engaged band
    pub oversample_factor: OversampleFactor,
    pub oversample_quality: OversampleQuality,
    /// Band drive above which oversampling engages; 1.0 disables it
    pub oversample_threshold: f64,
    /// Gate crossfade length
    pub crossfade_ms: f64,
    /// Parameter smoothing time
    pub smoothing_ms: f64,
    pub dc_cutoff_hz: f64,
    pub character: Character,
    pub thermal: ThermalConfig,
    /// Set FTZ/DAZ on the processing thread
    pub configure_fp_env: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            low_crossover_hz: DEFAULT_LOW_CROSSOVER_HZ,
            high_crossover_hz: DEFAULT_HIGH_CROSSOVER_HZ,
            oversample_factor: OversampleFactor::X2,
            oversample_quality: OversampleQuality::Standard,
            oversample_threshold: 0.3,
            crossfade_ms: 5.0,
            smoothing_ms: 20.0,
            dc_cutoff_hz: DEFAULT_DC_CUTOFF_HZ,
            character: Character::Exciter,
            thermal: ThermalConfig::default(),
            configure_fp_env: true,
        }
    }
}

impl EngineConfig {
    /// Parse and validate
    pub fn from_json_str(json: &str) -> HxResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| HxError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate
    pub fn from_file(path: impl AsRef<Path>) -> HxResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> HxResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| HxError::Serialization(e.to_string()))
    }

    /// Reject values `sanitized` would have to change
    pub fn validate(&self) -> HxResult<()> {
        check_range("low_crossover_hz", self.low_crossover_hz, MIN_CROSSOVER_HZ, MAX_CROSSOVER_HZ)?;
        check_range("high_crossover_hz", self.high_crossover_hz, MIN_CROSSOVER_HZ, MAX_CROSSOVER_HZ)?;
        if self.high_crossover_hz <= self.low_crossover_hz {
            return Err(HxError::InvalidConfig(format!(
                "high_crossover_hz ({}) must be above low_crossover_hz ({})",
                self.high_crossover_hz, self.low_crossover_hz
            )));
        }
        check_range("oversample_threshold", self.oversample_threshold, 0.0, 1.0)?;
        check_range("crossfade_ms", self.crossfade_ms, 0.0, MAX_CROSSFADE_MS)?;
        check_range("smoothing_ms", self.smoothing_ms, 0.0, MAX_SMOOTHING_MS)?;
        check_range("dc_cutoff_hz", self.dc_cutoff_hz, DC_CUTOFF_RANGE.0, DC_CUTOFF_RANGE.1)?;
        check_range("thermal.amount", self.thermal.amount, 0.0, 1.0)?;
        Ok(())
    }

    /// Clamp every field into range, logging what changed
    pub fn sanitized(&self) -> Self {
        let mut out = self.clone();
        out.low_crossover_hz = clamp_logged(
            "low_crossover_hz",
            self.low_crossover_hz,
            MIN_CROSSOVER_HZ,
            MAX_CROSSOVER_HZ,
            DEFAULT_LOW_CROSSOVER_HZ,
        );
        out.high_crossover_hz = clamp_logged(
            "high_crossover_hz",
            self.high_crossover_hz,
            MIN_CROSSOVER_HZ,
            MAX_CROSSOVER_HZ,
            DEFAULT_HIGH_CROSSOVER_HZ,
        );
        if out.high_crossover_hz <= out.low_crossover_hz {
            log::warn!(
                "Crossovers out of order ({} >= {}), reordering",
                out.low_crossover_hz,
                out.high_crossover_hz
            );
            let low = out.low_crossover_hz.min(out.high_crossover_hz);
            let high = out.low_crossover_hz.max(out.high_crossover_hz);
            out.low_crossover_hz = low;
            out.high_crossover_hz = if high > low {
                high
            } else {
                (low * MIN_SPLIT_RATIO).min(MAX_CROSSOVER_HZ)
            };
            if out.high_crossover_hz <= out.low_crossover_hz {
                out.low_crossover_hz = out.high_crossover_hz / MIN_SPLIT_RATIO;
            }
        }
        out.oversample_threshold =
            clamp_logged("oversample_threshold", self.oversample_threshold, 0.0, 1.0, 0.3);
        out.crossfade_ms = clamp_logged("crossfade_ms", self.crossfade_ms, 0.0, MAX_CROSSFADE_MS, 5.0);
        out.smoothing_ms =
            clamp_logged("smoothing_ms", self.smoothing_ms, 0.0, MAX_SMOOTHING_MS, 20.0);
        out.dc_cutoff_hz = clamp_logged(
            "dc_cutoff_hz",
            self.dc_cutoff_hz,
            DC_CUTOFF_RANGE.0,
            DC_CUTOFF_RANGE.1,
            DEFAULT_DC_CUTOFF_HZ,
        );
        out.thermal.amount = clamp_logged("thermal.amount", self.thermal.amount, 0.0, 1.0, 0.2);
        out
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> HxResult<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(HxError::InvalidConfig(format!(
            "{name} = {value} outside [{min}, {max}]"
        )))
    }
}

fn clamp_logged(name: &str, value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if !value.is_finite() {
        log::warn!("{name} is {value}, using {fallback}");
        return fallback;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::warn!("{name} = {value} clamped to {clamped}");
    }
    clamped
}
