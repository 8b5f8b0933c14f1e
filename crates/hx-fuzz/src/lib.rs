//! # hx-fuzz
//!
//! Seeded fuzzing and soak testing for the harmonic exciter engine.
//!
//! ## Features
//!
//! - **Reproducible runs**: every generator is driven by a seeded ChaCha8 stream
//! - **Crash detection**: panics are caught per iteration and recorded
//! - **Property checks**: finite, bounded output and lifecycle invariants
//! - **CI integration**: text, JSON and JUnit reports
//!
//! ## Example
//!
//! ```rust,no_run
//! use hx_fuzz::{run_engine_fuzz_suite, FuzzConfig};
//!
//! let report = run_engine_fuzz_suite(&FuzzConfig::ci());
//! println!("{}", report.to_text());
//! assert!(report.all_passed());
//! ```

pub mod config;
pub mod engine_fuzz;
pub mod generators;
pub mod harness;
pub mod report;
pub mod soak;

pub use config::FuzzConfig;
pub use engine_fuzz::run_engine_fuzz_suite;
pub use generators::{AudioInputs, AudioPattern, InputGenerator};
pub use harness::{FailureType, FuzzFailure, FuzzResult, FuzzRunner};
pub use report::{FuzzReport, ReportFormat};
pub use soak::{run_soak, SoakOptions, SoakReport};

use hx_core::HxError;
use thiserror::Error;

/// Errors raised around fuzzing runs
#[derive(Error, Debug)]
pub enum FuzzError {
    #[error("Invalid fuzz configuration: {0}")]
    Config(String),

    #[error("{0} fuzz target(s) failed")]
    TargetsFailed(usize),

    #[error("Unstable soak run: {0}")]
    Unstable(String),

    #[error("Engine error: {0}")]
    Engine(#[from] HxError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FuzzError>;

/// Run the engine suite and fail if any target failed
pub fn run_suite_checked(config: &FuzzConfig) -> Result<FuzzReport> {
    config.validate()?;
    let report = run_engine_fuzz_suite(config);
    if report.all_passed() {
        Ok(report)
    } else {
        Err(FuzzError::TargetsFailed(report.summary.failed_targets))
    }
}
