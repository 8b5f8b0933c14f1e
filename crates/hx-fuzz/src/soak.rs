//! Long-run stability
//!
//! Streams a tone plus noise through a stereo engine under slow random
//! automation, then checks that the output stayed finite and bounded, that
//! per-block cost did not creep up between the first and last tenth of the
//! run, and that silence after a reset comes out as exact silence.

use std::time::Instant;

use hx_dsp::safety::LIMIT_CEILING;
use hx_dsp::{EngineConfig, EngineParam, HarmonicExciter};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::{FuzzError, Result};

/// Tone level, -12 dBFS
const TONE_AMPLITUDE: f64 = 0.25;

const TONE_HZ: f64 = 1_000.0;

const NOISE_AMPLITUDE: f64 = 0.05;

/// Automation is retargeted this often
const AUTOMATION_SECONDS: f64 = 1.0;

/// Silence fed after the final reset
const SILENCE_SECONDS: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct SoakOptions {
    pub seconds: f64,
    pub sample_rate: f64,
    pub block_size: usize,
    pub seed: u64,
    pub engine: EngineConfig,
}

impl Default for SoakOptions {
    fn default() -> Self {
        Self {
            seconds: 60.0,
            sample_rate: 48_000.0,
            block_size: 512,
            seed: 1,
            engine: EngineConfig::default(),
        }
    }
}

/// Result of a soak run
#[derive(Debug, Clone, Serialize)]
pub struct SoakReport {
    pub seconds: f64,
    pub sample_rate: f64,
    pub block_size: usize,
    pub seed: u64,
    pub blocks: usize,
    pub samples: usize,
    /// Non-finite samples written back to the host
    pub non_finite_outputs: usize,
    /// Engine-side replacements, from diagnostics
    pub non_finite_replaced: u64,
    pub peak: f64,
    /// Mean cost of the first tenth of blocks
    pub first_decile_ns: f64,
    /// Mean cost of the last tenth of blocks
    pub last_decile_ns: f64,
    /// `last / first - 1`
    pub cpu_delta: f64,
    /// Processing speed relative to real time
    pub realtime_ratio: f64,
    /// Non-zero samples produced from silence after reset
    pub silence_violations: usize,
    pub duration_ms: u64,
}

impl SoakReport {
    /// Fail on any instability, or on a per-block cost increase above
    /// `max_cpu_delta`
    pub fn check(&self, max_cpu_delta: f64) -> Result<()> {
        let mut problems = Vec::new();
        if self.non_finite_outputs > 0 {
            problems.push(format!("{} non-finite outputs", self.non_finite_outputs));
        }
        if self.peak > LIMIT_CEILING {
            problems.push(format!("peak {:.3} above {LIMIT_CEILING}", self.peak));
        }
        if self.cpu_delta > max_cpu_delta {
            problems.push(format!(
                "block cost grew {:.1}% (limit {:.1}%)",
                self.cpu_delta * 100.0,
                max_cpu_delta * 100.0
            ));
        }
        if self.silence_violations > 0 {
            problems.push(format!("{} non-zero samples from silence", self.silence_violations));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(FuzzError::Unstable(problems.join(", ")))
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} blocks ({:.0} s at {} Hz), peak {:.3}, {:.0} -> {:.0} ns/block ({:+.1}%), {:.1}x realtime",
            self.blocks,
            self.seconds,
            self.sample_rate,
            self.peak,
            self.first_decile_ns,
            self.last_decile_ns,
            self.cpu_delta * 100.0,
            self.realtime_ratio
        )
    }
}

/// Run a soak test
pub fn run_soak(options: &SoakOptions) -> Result<SoakReport> {
    if !(options.seconds.is_finite() && options.seconds > 0.0) {
        return Err(FuzzError::Config(format!("soak length {} s", options.seconds)));
    }

    let mut engine = HarmonicExciter::try_new(options.engine.clone())?;
    engine.prepare_to_play(options.sample_rate, options.block_size);
    let sample_rate = engine.sample_rate();
    let block = engine.max_block_size();
    let handle = engine.handle();

    let total_samples = (options.seconds * sample_rate) as usize;
    let blocks = total_samples.div_ceil(block).max(1);
    let decile = (blocks / 10).max(1);
    let automation_interval = ((AUTOMATION_SECONDS * sample_rate) as usize / block).max(1);

    log::info!(
        "Soak: {:.0} s at {sample_rate} Hz, block {block}, {blocks} blocks, seed {}",
        options.seconds,
        options.seed
    );

    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let mut left = vec![0.0; block];
    let mut right = vec![0.0; block];
    let phase_step = 2.0 * std::f64::consts::PI * TONE_HZ / sample_rate;
    let mut phase: f64 = 0.0;

    let mut non_finite_outputs = 0;
    let mut peak: f64 = 0.0;
    let mut first_ns = 0.0;
    let mut last_ns = 0.0;
    let mut busy_ns = 0.0;

    let start = Instant::now();
    for index in 0..blocks {
        if index % automation_interval == 0 {
            for param in EngineParam::ALL {
                handle.set(param, rng.random::<f64>());
            }
        }

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let tone = TONE_AMPLITUDE * phase.sin();
            *l = tone + NOISE_AMPLITUDE * rng.random_range(-1.0..=1.0);
            *r = tone + NOISE_AMPLITUDE * rng.random_range(-1.0..=1.0);
            phase = (phase + phase_step) % std::f64::consts::TAU;
        }

        let began = Instant::now();
        engine.process(&mut [left.as_mut_slice(), right.as_mut_slice()]);
        let ns = began.elapsed().as_nanos() as f64;

        busy_ns += ns;
        if index < decile {
            first_ns += ns;
        }
        if index >= blocks - decile {
            last_ns += ns;
        }

        for &y in left.iter().chain(&right) {
            if y.is_finite() {
                peak = peak.max(y.abs());
            } else {
                non_finite_outputs += 1;
            }
        }

        if index > 0 && index % (automation_interval * 60) == 0 {
            log::debug!("Soak: {index}/{blocks} blocks, peak {peak:.3}");
        }
    }

    engine.reset();
    let mut silence_violations = 0;
    let silence_blocks = ((SILENCE_SECONDS * sample_rate) as usize).div_ceil(block);
    for _ in 0..silence_blocks {
        left.fill(0.0);
        right.fill(0.0);
        engine.process(&mut [left.as_mut_slice(), right.as_mut_slice()]);
        silence_violations += left.iter().chain(&right).filter(|&&y| y != 0.0).count();
    }

    let first_decile_ns = first_ns / decile as f64;
    let last_decile_ns = last_ns / decile as f64;
    let cpu_delta = if first_decile_ns > 0.0 {
        last_decile_ns / first_decile_ns - 1.0
    } else {
        0.0
    };
    let realtime_ratio = if busy_ns > 0.0 {
        (blocks * block) as f64 / sample_rate * 1e9 / busy_ns
    } else {
        0.0
    };

    let report = SoakReport {
        seconds: options.seconds,
        sample_rate,
        block_size: block,
        seed: options.seed,
        blocks,
        samples: blocks * block,
        non_finite_outputs,
        non_finite_replaced: engine.diagnostics().non_finite_replaced,
        peak,
        first_decile_ns,
        last_decile_ns,
        cpu_delta,
        realtime_ratio,
        silence_violations,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    log::info!("Soak: {}", report.summary());
    Ok(report)
}
