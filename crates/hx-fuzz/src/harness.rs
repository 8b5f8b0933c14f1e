//! Fuzzing harness and runner

use crate::config::FuzzConfig;
use crate::generators::InputGenerator;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Result of a fuzzing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzResult {
    /// Total iterations run
    pub iterations: usize,

    /// Number of successful iterations
    pub successes: usize,

    /// Number of failures (panics, invalid outputs and timeouts)
    pub failures: usize,

    /// Number of panics caught
    pub panics: usize,

    /// Iterations that exceeded the per-iteration budget
    pub timeouts: usize,

    /// Total duration
    pub duration_ms: u64,

    /// Seed used (for reproducibility)
    pub seed: Option<u64>,

    /// List of failures with details
    pub failure_details: Vec<FuzzFailure>,

    /// Whether all iterations passed
    pub passed: bool,
}

/// Details of a fuzzing failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzFailure {
    /// Iteration number when failure occurred
    pub iteration: usize,

    /// Type of failure
    pub failure_type: FailureType,

    /// Description of the failure
    pub description: String,

    /// Input that caused the failure (`Debug` formatted, truncated)
    pub input: String,
}

/// Type of fuzzing failure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureType {
    Panic,
    InvalidOutput,
    Timeout,
}

/// Longest recorded input description
const MAX_INPUT_CHARS: usize = 512;

/// Main fuzzing runner
pub struct FuzzRunner {
    config: FuzzConfig,
}

impl FuzzRunner {
    /// Create a new fuzzing runner
    pub fn new(config: FuzzConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    /// Fuzz with output validation
    pub fn fuzz_with_validation<I, O, F, G, V>(
        &self,
        input_gen: G,
        target: F,
        validator: V,
    ) -> FuzzResult
    where
        I: std::fmt::Debug + Clone,
        G: Fn(&mut InputGenerator) -> I,
        F: Fn(I) -> O,
        V: Fn(&I, &O) -> Result<(), String>,
    {
        let mut generator = InputGenerator::new(self.config.seed, self.config.max_buffer_frames)
            .with_edge_cases(self.config.include_edge_cases)
            .with_boundaries(self.config.include_boundaries);

        let budget = Duration::from_millis(self.config.timeout_ms);
        let mut successes = 0;
        let mut panics = 0;
        let mut timeouts = 0;
        let mut failure_details: Vec<FuzzFailure> = Vec::new();

        let start = Instant::now();

        for iteration in 0..self.config.iterations {
            if !self.config.continue_on_failure && !failure_details.is_empty() {
                break;
            }
            if failure_details.len() >= self.config.max_failures {
                break;
            }

            let input = input_gen(&mut generator);
            let input_clone = input.clone();

            let began = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| target(input)));
            let elapsed = began.elapsed();

            let failure = match result {
                Ok(output) => match validator(&input_clone, &output) {
                    Ok(()) if elapsed <= budget => None,
                    Ok(()) => {
                        timeouts += 1;
                        Some((
                            FailureType::Timeout,
                            format!("took {} ms (budget {} ms)", elapsed.as_millis(), budget.as_millis()),
                        ))
                    }
                    Err(message) => Some((FailureType::InvalidOutput, message)),
                },
                Err(payload) => {
                    panics += 1;
                    Some((FailureType::Panic, panic_message(payload.as_ref())))
                }
            };

            match failure {
                None => successes += 1,
                Some((failure_type, description)) => {
                    if self.config.verbosity >= 1 {
                        log::warn!("{failure_type:?} at iteration {iteration}: {description}");
                    }
                    failure_details.push(FuzzFailure {
                        iteration,
                        failure_type,
                        description,
                        input: describe_input(&input_clone),
                    });
                }
            }
        }

        let failures = failure_details.len();
        FuzzResult {
            iterations: successes + failures,
            successes,
            failures,
            panics,
            timeouts,
            duration_ms: start.elapsed().as_millis() as u64,
            seed: self.config.seed,
            failure_details,
            passed: failures == 0,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

fn describe_input<I: std::fmt::Debug>(input: &I) -> String {
    let mut text = format!("{input:?}");
    if text.len() > MAX_INPUT_CHARS {
        let mut cut = MAX_INPUT_CHARS;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}

impl FuzzResult {
    pub fn is_pass(&self) -> bool {
        self.passed
    }

    pub fn pass_rate(&self) -> f64 {
        if self.iterations == 0 {
            1.0
        } else {
            self.successes as f64 / self.iterations as f64
        }
    }

    pub fn iterations_per_sec(&self) -> f64 {
        if self.duration_ms == 0 {
            0.0
        } else {
            self.iterations as f64 * 1000.0 / self.duration_ms as f64
        }
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} - {} iterations, {} failures ({:.2}% pass rate) in {}ms ({:.0} iter/s)",
            if self.passed { "PASS" } else { "FAIL" },
            self.iterations,
            self.failures,
            self.pass_rate() * 100.0,
            self.duration_ms,
            self.iterations_per_sec()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fuzz_f64<R>(runner: &FuzzRunner, target: impl Fn(f64) -> R) -> FuzzResult {
        runner.fuzz_with_validation(|g| g.f64(), target, |_, _| Ok(()))
    }

    #[test]
    fn test_fuzz_no_panic() {
        let runner = FuzzRunner::new(FuzzConfig::minimal().with_seed(42));
        let result = fuzz_f64(&runner, |x| x * 2.0);
        assert!(result.passed);
        assert_eq!(result.failures, 0);
        assert_eq!(result.iterations, 25);
    }

    #[test]
    fn test_fuzz_catches_panic() {
        let runner = FuzzRunner::new(FuzzConfig::minimal().with_seed(42).with_iterations(100));
        let result = fuzz_f64(&runner, |x| {
            if x.is_nan() {
                panic!("NaN not allowed!");
            }
            x
        });
        assert!(!result.passed);
        assert!(result.panics > 0);
        assert_eq!(result.failure_details[0].failure_type, FailureType::Panic);
        assert!(result.failure_details[0].description.contains("NaN"));
    }

    #[test]
    fn test_fuzz_with_validation() {
        let runner = FuzzRunner::new(FuzzConfig::minimal().with_seed(42).with_iterations(100));
        let result = runner.fuzz_with_validation(
            |g| g.f64(),
            |x| if x.is_nan() { 0.0 } else { x.clamp(-1.0, 1.0) },
            |_input, output| {
                if (-1.0..=1.0).contains(output) {
                    Ok(())
                } else {
                    Err(format!("Output {output} out of range"))
                }
            },
        );
        assert!(result.passed);
    }

    #[test]
    fn test_stop_on_first_failure() {
        let config = FuzzConfig::minimal()
            .with_seed(1)
            .with_iterations(100)
            .continue_after_failures(false);
        let result = fuzz_f64(&FuzzRunner::new(config), |_| -> f64 { panic!("always") });
        assert_eq!(result.failures, 1);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn test_timeout_recorded() {
        let config = FuzzConfig::minimal().with_seed(3).with_iterations(2).with_timeout_ms(0);
        let result =
            fuzz_f64(&FuzzRunner::new(config), |_| std::thread::sleep(Duration::from_millis(2)));
        assert_eq!(result.timeouts, 2);
        assert!(!result.passed);
    }

    #[test]
    fn test_validator_failure_recorded() {
        let runner = FuzzRunner::new(FuzzConfig::minimal().with_seed(5));
        let result = runner.fuzz_with_validation(
            |g| g.f64(),
            |x| x,
            |_, _: &f64| Err("rejected".to_string()),
        );
        assert!(!result.passed);
        assert_eq!(result.panics, 0);
        assert_eq!(result.successes, 0);
        assert!(result
            .failure_details
            .iter()
            .all(|f| f.failure_type == FailureType::InvalidOutput && f.description == "rejected"));
    }

    #[test]
    fn test_reproducibility() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let sum = |seed| {
            let total = AtomicU64::new(0);
            let runner = FuzzRunner::new(FuzzConfig::minimal().with_seed(seed).with_iterations(50));
            fuzz_f64(&runner, |x| {
                if x.is_finite() {
                    total.fetch_add((x.abs().min(1e6) * 1000.0) as u64, Ordering::Relaxed);
                }
            });
            total.load(Ordering::Relaxed)
        };
        assert_eq!(sum(12345), sum(12345));
    }

    #[test]
    fn test_long_input_truncated() {
        let text = describe_input(&vec![0.5f64; 1000]);
        assert!(text.len() <= MAX_INPUT_CHARS + 3);
        assert!(text.ends_with("..."));
    }
}
