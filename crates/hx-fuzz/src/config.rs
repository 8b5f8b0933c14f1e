//! Fuzzing configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{FuzzError, Result};

/// Configuration for fuzzing runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzConfig {
    /// Iterations per target
    pub iterations: usize,

    /// Random seed for reproducibility (None = fresh OS entropy)
    pub seed: Option<u64>,

    /// Largest host buffer handed to the engine, in frames
    pub max_buffer_frames: usize,

    /// Per-iteration budget in milliseconds; slower iterations count as timeouts
    pub timeout_ms: u64,

    /// Whether to continue after the first failure
    pub continue_on_failure: bool,

    /// Maximum recorded failures before a target stops
    pub max_failures: usize,

    /// Include NaN, Inf and extreme finite values
    pub include_edge_cases: bool,

    /// Include boundary values (0, ±1, range limits)
    pub include_boundaries: bool,

    /// Verbosity level (0-3)
    pub verbosity: u8,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            iterations: 2_000,
            seed: None,
            max_buffer_frames: 4096,
            timeout_ms: 2000,
            continue_on_failure: true,
            max_failures: 100,
            include_edge_cases: true,
            include_boundaries: true,
            verbosity: 1,
        }
    }
}

impl FuzzConfig {
    /// Quick config for CI
    pub fn ci() -> Self {
        Self {
            iterations: 200,
            seed: Some(0x00C1),
            verbosity: 0,
            ..Default::default()
        }
    }

    /// Long local run
    pub fn exhaustive() -> Self {
        Self {
            iterations: 100_000,
            timeout_ms: 10_000,
            max_buffer_frames: 16_384,
            verbosity: 2,
            ..Default::default()
        }
    }

    /// Sanity check
    pub fn minimal() -> Self {
        Self {
            iterations: 25,
            max_buffer_frames: 1024,
            ..Default::default()
        }
    }

    pub fn with_iterations(mut self, n: usize) -> Self {
        self.iterations = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_buffer_frames(mut self, frames: usize) -> Self {
        self.max_buffer_frames = frames;
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn with_verbosity(mut self, level: u8) -> Self {
        self.verbosity = level;
        self
    }

    pub fn continue_after_failures(mut self, cont: bool) -> Self {
        self.continue_on_failure = cont;
        self
    }

    /// Load a JSON config; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_buffer_frames == 0 {
            return Err(FuzzError::Config("max_buffer_frames must be at least 1".into()));
        }
        if self.max_failures == 0 {
            return Err(FuzzError::Config("max_failures must be at least 1".into()));
        }
        if self.verbosity > 3 {
            return Err(FuzzError::Config(format!("verbosity {} above 3", self.verbosity)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FuzzConfig::default();
        assert_eq!(config.iterations, 2_000);
        assert!(config.include_edge_cases);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_presets() {
        assert!(FuzzConfig::ci().seed.is_some());
        assert!(FuzzConfig::exhaustive().iterations > FuzzConfig::default().iterations);
        assert!(FuzzConfig::minimal().iterations < FuzzConfig::ci().iterations);
    }

    #[test]
    fn test_builder() {
        let config = FuzzConfig::default()
            .with_iterations(5000)
            .with_seed(42)
            .with_timeout_ms(500);

        assert_eq!(config.iterations, 5000);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.timeout_ms, 500);
    }

    #[test]
    fn test_json_partial() {
        let config: FuzzConfig = serde_json::from_str(r#"{ "iterations": 7 }"#).expect("parse");
        assert_eq!(config.iterations, 7);
        assert_eq!(config.max_failures, 100);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fuzz.json");

        std::fs::write(&path, r#"{ "iterations": 3, "seed": 9 }"#).expect("write");
        let config = FuzzConfig::from_file(&path).expect("load");
        assert_eq!(config.seed, Some(9));

        std::fs::write(&path, r#"{ "max_buffer_frames": 0 }"#).expect("write");
        assert!(matches!(FuzzConfig::from_file(&path), Err(FuzzError::Config(_))));

        std::fs::write(&path, "{ not json").expect("write");
        assert!(matches!(FuzzConfig::from_file(&path), Err(FuzzError::Serialization(_))));

        let missing = dir.path().join("missing.json");
        assert!(matches!(FuzzConfig::from_file(missing), Err(FuzzError::Io(_))));
    }
}
