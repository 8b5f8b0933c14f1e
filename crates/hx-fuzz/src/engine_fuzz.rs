//! Engine fuzz targets
//!
//! Every target builds its own engine per iteration and reports a
//! violated property as `Err(description)`, which the validator turns into
//! an `InvalidOutput` failure. Panics are caught by the runner.

use hx_core::{clamp_block_size, clamp_sample_rate, MAX_CHANNELS};
use hx_dsp::crossover::Band;
use hx_dsp::engine::NUM_PARAMS;
use hx_dsp::harmonic::{CurveModel, HarmonicGenerator, ShaperPair};
use hx_dsp::safety::LIMIT_CEILING;
use hx_dsp::{EngineConfig, EngineState, HarmonicExciter, ThermalConfig};
use serde_json::Value;

use crate::config::FuzzConfig;
use crate::generators::{AudioInputs, InputGenerator};
use crate::harness::{FuzzResult, FuzzRunner};
use crate::report::FuzzReport;

type Outcome = Result<(), String>;

/// Relative slack on the output bound for rounding in the dry/wet blend
const BOUND_SLACK: f64 = 1e-9;

const CURVES: [CurveModel; 5] = [
    CurveModel::Tube,
    CurveModel::Transistor,
    CurveModel::Tape,
    CurveModel::Diode,
    CurveModel::Fold,
];

// ============================================================================
// Input types
// ============================================================================

/// One engine construction plus a single processed buffer
#[derive(Debug, Clone)]
pub struct ConfigCase {
    pub config: EngineConfig,
    pub sample_rate: f64,
    pub block_size: usize,
    pub signal: Vec<f64>,
}

/// Parameter updates applied before a stereo block
#[derive(Debug, Clone)]
pub struct AutomationBlock {
    pub updates: Vec<(u32, f64)>,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct AutomationCase {
    pub thermal_seed: u64,
    pub sample_rate: f64,
    pub block_size: usize,
    pub blocks: Vec<AutomationBlock>,
}

/// Interleaved host buffer with an arbitrary channel count
#[derive(Debug, Clone)]
pub struct InterleavedCase {
    pub num_channels: usize,
    pub block_size: usize,
    pub buffer: Vec<f32>,
}

/// Host call made against the engine
#[derive(Debug, Clone)]
pub enum LifecycleOp {
    Prepare { sample_rate: f64, block_size: usize },
    Process { frames: usize },
    ProcessInterleaved { frames: usize, channels: usize },
    SetParameter { id: u32, value: f64 },
    Reset,
}

#[derive(Debug, Clone)]
pub struct CurveCase {
    pub pair: ShaperPair,
    pub input: f64,
    pub drive: f64,
    pub color: f64,
    pub bias_offset: f64,
}

// ============================================================================
// Generators
// ============================================================================

fn random_config(g: &mut InputGenerator) -> EngineConfig {
    EngineConfig {
        low_crossover_hz: g.f64_range(-100.0, 30_000.0),
        high_crossover_hz: g.f64_range(-100.0, 50_000.0),
        oversample_factor: g.oversample_factor(),
        oversample_quality: g.oversample_quality(),
        oversample_threshold: g.f64_range(-0.5, 1.5),
        crossfade_ms: g.f64_range(-10.0, 200.0),
        smoothing_ms: g.f64_range(-10.0, 2_000.0),
        dc_cutoff_hz: g.f64_range(-5.0, 400.0),
        character: g.character(),
        thermal: ThermalConfig {
            enabled: g.bool(),
            amount: g.f64_range(-0.5, 1.5),
            seed: g.u64(),
        },
        configure_fp_env: g.bool(),
    }
}

fn config_case(g: &mut InputGenerator) -> ConfigCase {
    let sample_rate = g.sample_rate();
    let frames = g.usize(g.max_frames());
    let pattern = AudioInputs::random_pattern(g);
    ConfigCase {
        config: random_config(g),
        sample_rate,
        block_size: g.block_size(),
        signal: AudioInputs::pattern_buffer(g, frames, pattern, clamp_sample_rate(sample_rate)),
    }
}

fn automation_case(g: &mut InputGenerator) -> AutomationCase {
    let sample_rate = clamp_sample_rate(g.sample_rate());
    let num_blocks = 1 + g.pick(6);
    let blocks = (0..num_blocks)
        .map(|_| {
            let updates = (0..g.pick(5))
                // ids past the table are ignored by the engine
                .map(|_| (g.pick(NUM_PARAMS + 2) as u32, g.param_value()))
                .collect();
            let frames = g.usize(g.max_frames());
            let left_pattern = AudioInputs::random_pattern(g);
            let right_pattern = AudioInputs::random_pattern(g);
            AutomationBlock {
                updates,
                left: AudioInputs::pattern_buffer(g, frames, left_pattern, sample_rate),
                right: AudioInputs::pattern_buffer(g, frames, right_pattern, sample_rate),
            }
        })
        .collect();

    AutomationCase {
        thermal_seed: g.u64(),
        sample_rate,
        block_size: g.block_size(),
        blocks,
    }
}

fn interleaved_case(g: &mut InputGenerator) -> InterleavedCase {
    let num_channels = g.channels();
    let frames = g.usize(g.max_frames());
    // a trailing partial frame is left alone by the engine
    let len = frames * num_channels.max(1) + g.pick(num_channels.max(1));
    let buffer = g.normalized_audio(len).into_iter().map(|x| x as f32).collect();
    InterleavedCase {
        num_channels,
        block_size: g.block_size(),
        buffer,
    }
}

fn lifecycle_ops(g: &mut InputGenerator) -> Vec<LifecycleOp> {
    let count = 1 + g.pick(12);
    (0..count)
        .map(|_| match g.pick(5) {
            0 => LifecycleOp::Prepare {
                sample_rate: g.sample_rate(),
                block_size: g.block_size(),
            },
            1 => LifecycleOp::Process {
                frames: g.usize(g.max_frames()),
            },
            2 => LifecycleOp::ProcessInterleaved {
                frames: g.usize(g.max_frames()),
                channels: g.channels(),
            },
            3 => LifecycleOp::SetParameter {
                id: g.pick(NUM_PARAMS + 2) as u32,
                value: g.param_value(),
            },
            _ => LifecycleOp::Reset,
        })
        .collect()
}

fn curve_case(g: &mut InputGenerator) -> CurveCase {
    let warm = CURVES[g.pick(CURVES.len())];
    let bright = CURVES[g.pick(CURVES.len())];
    let input = if g.bool() { g.f64() } else { g.f64_range(-8.0, 8.0) };
    CurveCase {
        pair: ShaperPair::new(warm, bright),
        input,
        drive: g.param_value(),
        color: g.param_value(),
        bias_offset: g.f64_range(-1.0, 1.0),
    }
}

/// Default config JSON with one structural mutation applied
fn mutated_config_json(g: &mut InputGenerator) -> String {
    let mut value = serde_json::to_value(EngineConfig::default()).unwrap_or_default();

    match g.pick(4) {
        0 | 1 => {
            if let Value::Object(map) = &mut value {
                let keys: Vec<String> = map.keys().cloned().collect();
                if !keys.is_empty() {
                    let key = &keys[g.pick(keys.len())];
                    map.insert(key.clone(), random_json_value(g));
                }
            }
            value.to_string()
        }
        2 => {
            let text = value.to_string();
            let mut cut = g.pick(text.len() + 1);
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text[..cut].to_string()
        }
        _ => {
            if let Value::Object(map) = &mut value {
                map.insert("thermal".into(), random_json_value(g));
            }
            value.to_string()
        }
    }
}

fn random_json_value(g: &mut InputGenerator) -> Value {
    const WORDS: [&str; 6] = ["x2", "x4", "high", "fuzz", "wave_folder", "banana"];
    match g.pick(6) {
        // non-finite values serialize as null
        0 => Value::from(g.f64_range(-1e6, 1e6)),
        1 => Value::from(g.f64()),
        2 => Value::from(WORDS[g.pick(WORDS.len())]),
        3 => Value::Bool(g.bool()),
        4 => Value::Null,
        _ => serde_json::json!({ "enabled": g.bool(), "amount": g.f64() }),
    }
}

// ============================================================================
// Checks
// ============================================================================

fn finite_peak(samples: &[f64]) -> f64 {
    samples
        .iter()
        .filter(|x| x.is_finite())
        .fold(0.0, |peak, x| peak.max(x.abs()))
}

/// Output is finite and no louder than the loudest finite input so far or
/// the limiter ceiling
fn check_output(label: &str, output: &[f64], input_peak: f64) -> Outcome {
    let bound = input_peak.max(LIMIT_CEILING) * (1.0 + BOUND_SLACK);
    for (i, &y) in output.iter().enumerate() {
        if !y.is_finite() {
            return Err(format!("{label}: non-finite output {y} at sample {i}"));
        }
        if y.abs() > bound {
            return Err(format!("{label}: |{y}| at sample {i} exceeds bound {bound}"));
        }
    }
    Ok(())
}

fn run_config_case(case: ConfigCase) -> Outcome {
    let ConfigCase {
        config,
        sample_rate,
        block_size,
        mut signal,
    } = case;

    if HarmonicExciter::try_new(config.clone()).is_ok() != config.validate().is_ok() {
        return Err("try_new and validate disagree".into());
    }

    let mut engine = HarmonicExciter::new(config);
    engine
        .config()
        .validate()
        .map_err(|e| format!("sanitized config rejected: {e}"))?;

    engine.prepare_to_play(sample_rate, block_size);
    if engine.sample_rate() != clamp_sample_rate(sample_rate) {
        return Err(format!("sample rate {} not clamped", engine.sample_rate()));
    }
    if engine.max_block_size() != clamp_block_size(block_size) {
        return Err(format!("block size {} not clamped", engine.max_block_size()));
    }
    let latency = engine.latency();

    let input_peak = finite_peak(&signal);
    engine.process(&mut [signal.as_mut_slice()]);
    check_output("mono", &signal, input_peak)?;

    if engine.latency() != latency {
        return Err("latency changed while processing".into());
    }
    for ch in 0..MAX_CHANNELS {
        match engine.thermal_offset(ch) {
            Some(offset) if offset.is_finite() => {}
            other => return Err(format!("thermal offset {other:?} on channel {ch}")),
        }
    }
    Ok(())
}

fn run_automation_case(case: AutomationCase) -> Outcome {
    let config = EngineConfig {
        thermal: ThermalConfig {
            seed: case.thermal_seed,
            ..ThermalConfig::default()
        },
        configure_fp_env: false,
        ..EngineConfig::default()
    };
    let mut engine = HarmonicExciter::new(config);
    engine.prepare_to_play(case.sample_rate, case.block_size);
    let handle = engine.handle();

    let mut input_peak: f64 = 0.0;
    for (index, block) in case.blocks.into_iter().enumerate() {
        let AutomationBlock {
            updates,
            mut left,
            mut right,
        } = block;

        handle.update_parameters(updates);
        for id in 0..NUM_PARAMS as u32 {
            match handle.get_parameter(id) {
                Some(v) if (0.0..=1.0).contains(&v) => {}
                other => return Err(format!("parameter {id} target {other:?} out of range")),
            }
        }

        input_peak = input_peak.max(finite_peak(&left)).max(finite_peak(&right));
        engine.process(&mut [left.as_mut_slice(), right.as_mut_slice()]);
        check_output(&format!("block {index} left"), &left, input_peak)?;
        check_output(&format!("block {index} right"), &right, input_peak)?;
    }

    for band in Band::ALL {
        if engine.is_oversampling(MAX_CHANNELS, band) {
            return Err(format!("{band:?} reported oversampling on a missing channel"));
        }
    }
    Ok(())
}

fn run_interleaved_case(case: InterleavedCase) -> Outcome {
    let InterleavedCase {
        num_channels,
        block_size,
        mut buffer,
    } = case;
    let original = buffer.clone();

    let mut engine = HarmonicExciter::new(EngineConfig {
        configure_fp_env: false,
        ..EngineConfig::default()
    });
    engine.prepare_to_play(48_000.0, block_size);
    engine.process_interleaved(&mut buffer, num_channels);

    if num_channels == 0 {
        return if buffer == original {
            Ok(())
        } else {
            Err("zero-channel call modified the buffer".into())
        };
    }

    let whole = buffer.len() / num_channels * num_channels;
    for (i, (&y, &x)) in buffer.iter().zip(&original).enumerate() {
        let processed = i < whole && i % num_channels < MAX_CHANNELS;
        if !y.is_finite() {
            return Err(format!("non-finite output at {i}"));
        }
        if !processed && y.to_bits() != x.to_bits() {
            return Err(format!("unprocessed sample {i} changed from {x} to {y}"));
        }
        if processed && f64::from(y.abs()) > LIMIT_CEILING.max(1.0) * (1.0 + BOUND_SLACK) {
            return Err(format!("sample {i} = {y} exceeds bound"));
        }
    }
    Ok(())
}

fn run_lifecycle(ops: Vec<LifecycleOp>) -> Outcome {
    let mut engine = HarmonicExciter::new(EngineConfig {
        configure_fp_env: false,
        ..EngineConfig::default()
    });
    let mut buffer = Vec::new();

    for (step, op) in ops.into_iter().enumerate() {
        let before = engine.state();
        match op {
            LifecycleOp::Prepare {
                sample_rate,
                block_size,
            } => {
                engine.prepare_to_play(sample_rate, block_size);
                if engine.state() != EngineState::Prepared {
                    return Err(format!("step {step}: {:?} after prepare", engine.state()));
                }
            }
            LifecycleOp::Process { frames } => {
                buffer.clear();
                buffer.extend((0..frames).map(|i| 0.5 * (i as f64 * 0.05).sin()));
                let original = buffer.clone();
                engine.process(&mut [buffer.as_mut_slice()]);

                let expected = match before {
                    EngineState::Unprepared => EngineState::Unprepared,
                    _ if frames == 0 => before,
                    _ => EngineState::Processing,
                };
                if engine.state() != expected {
                    return Err(format!("step {step}: {:?}, expected {expected:?}", engine.state()));
                }
                if before == EngineState::Unprepared && buffer != original {
                    return Err(format!("step {step}: unprepared engine touched the buffer"));
                }
                check_output(&format!("step {step}"), &buffer, 0.5)?;
            }
            LifecycleOp::ProcessInterleaved { frames, channels } => {
                let mut frames_buf = vec![0.25f32; frames * channels];
                engine.process_interleaved(&mut frames_buf, channels);
                if let Some(x) = frames_buf.iter().find(|x| !x.is_finite()) {
                    return Err(format!("step {step}: non-finite interleaved output {x}"));
                }
            }
            LifecycleOp::SetParameter { id, value } => {
                let previous = engine.get_parameter(id);
                engine.set_parameter(id, value);
                let current = engine.get_parameter(id);
                if (id as usize) >= NUM_PARAMS && current.is_some() {
                    return Err(format!("step {step}: unknown id {id} accepted"));
                }
                if value.is_nan() && current != previous {
                    return Err(format!("step {step}: NaN changed parameter {id}"));
                }
            }
            LifecycleOp::Reset => {
                engine.reset();
                let expected = match before {
                    EngineState::Unprepared => EngineState::Unprepared,
                    _ => EngineState::Prepared,
                };
                if engine.state() != expected {
                    return Err(format!("step {step}: {:?} after reset", engine.state()));
                }
            }
        }
    }
    Ok(())
}

fn run_curve_case(case: CurveCase) -> Outcome {
    let mut generator = HarmonicGenerator::new(case.pair);
    generator.set_bias_offset(case.bias_offset);
    let y = generator.process(case.input, case.drive, case.color);

    if !y.is_finite() {
        return Err(format!("non-finite output {y}"));
    }
    if !case.input.is_finite() && y != 0.0 {
        return Err(format!("non-finite input produced {y}"));
    }
    if case.input.is_finite() && (case.drive.is_nan() || case.drive <= 0.0) && y != case.input {
        return Err(format!("drive {} is not identity: {} -> {y}", case.drive, case.input));
    }
    for model in CURVES {
        let zero = model.shape(0.0, case.drive.clamp(0.0, 1.0), generator.bias_offset());
        if zero.is_finite() && zero != 0.0 {
            return Err(format!("{} maps 0 to {zero}", model.name()));
        }
    }
    Ok(())
}

fn run_config_json(json: String) -> Outcome {
    match EngineConfig::from_json_str(&json) {
        Ok(config) => {
            config
                .validate()
                .map_err(|e| format!("accepted config fails validation: {e}"))?;
            HarmonicExciter::try_new(config)
                .map(|_| ())
                .map_err(|e| format!("accepted config rejected by try_new: {e}"))
        }
        Err(_) => Ok(()),
    }
}

// ============================================================================
// Targets
// ============================================================================

fn outcome_is_ok<I>(_input: &I, outcome: &Outcome) -> Outcome {
    outcome.clone()
}

/// Random, often invalid, engine configs and host settings
pub fn fuzz_engine_config(config: &FuzzConfig) -> FuzzResult {
    FuzzRunner::new(config.clone()).fuzz_with_validation(config_case, run_config_case, outcome_is_ok)
}

/// Stereo processing under random parameter automation and input patterns
pub fn fuzz_parameter_automation(config: &FuzzConfig) -> FuzzResult {
    FuzzRunner::new(config.clone()).fuzz_with_validation(
        automation_case,
        run_automation_case,
        outcome_is_ok,
    )
}

/// Interleaved buffers with 0..=4 channels and trailing partial frames
pub fn fuzz_interleaved_layouts(config: &FuzzConfig) -> FuzzResult {
    FuzzRunner::new(config.clone()).fuzz_with_validation(
        interleaved_case,
        run_interleaved_case,
        outcome_is_ok,
    )
}

/// Random sequences of prepare, process, parameter and reset calls
pub fn fuzz_lifecycle(config: &FuzzConfig) -> FuzzResult {
    FuzzRunner::new(config.clone()).fuzz_with_validation(lifecycle_ops, run_lifecycle, outcome_is_ok)
}

/// Every curve pairing with edge-case inputs, drives and colors
pub fn fuzz_harmonic_curves(config: &FuzzConfig) -> FuzzResult {
    FuzzRunner::new(config.clone()).fuzz_with_validation(curve_case, run_curve_case, outcome_is_ok)
}

/// Mutated and truncated config JSON
pub fn fuzz_config_json(config: &FuzzConfig) -> FuzzResult {
    FuzzRunner::new(config.clone()).fuzz_with_validation(
        mutated_config_json,
        run_config_json,
        outcome_is_ok,
    )
}

/// Run every engine target
pub fn run_engine_fuzz_suite(config: &FuzzConfig) -> FuzzReport {
    let mut report = FuzzReport::new("Harmonic Exciter Fuzz Report");

    report.add_result("engine_config", fuzz_engine_config(config));
    report.add_result("parameter_automation", fuzz_parameter_automation(config));
    report.add_result("interleaved_layouts", fuzz_interleaved_layouts(config));
    report.add_result("lifecycle", fuzz_lifecycle(config));
    report.add_result("harmonic_curves", fuzz_harmonic_curves(config));
    report.add_result("config_json", fuzz_config_json(config));

    report
}
