//! Real-time safety
//!
//! `process`, parameter updates and `reset` must not touch the allocator.
//! Any allocation inside `assert_no_alloc` aborts the test binary in debug
//! builds.

use assert_no_alloc::{AllocDisabler, assert_no_alloc};
use hx_dsp::{EngineConfig, EngineParam, HarmonicExciter};

#[global_allocator]
static A: AllocDisabler = AllocDisabler;

const SAMPLE_RATE: f64 = 48000.0;
const BLOCK_SIZE: usize = 256;

fn sine(len: usize, freq: f64) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 * (2.0 * std::f64::consts::PI * freq * i as f64 / SAMPLE_RATE).sin())
        .collect()
}

#[test]
fn test_process_does_not_allocate() {
    let mut engine = HarmonicExciter::new(EngineConfig::default());
    engine.prepare_to_play(SAMPLE_RATE, BLOCK_SIZE);
    let handle = engine.handle();

    let mut left = sine(BLOCK_SIZE * 40, 1000.0);
    let mut right = sine(BLOCK_SIZE * 40, 2500.0);

    assert_no_alloc(|| {
        for (i, (l, r)) in left
            .chunks_mut(BLOCK_SIZE)
            .zip(right.chunks_mut(BLOCK_SIZE))
            .enumerate()
        {
            // sweep drive across the gate threshold so every gate state runs
            handle.set(EngineParam::Drive, if (i / 8) % 2 == 0 { 1.0 } else { 0.0 });
            handle.set(EngineParam::Color, (i % 5) as f64 / 4.0);
            engine.process(&mut [l, r]);
        }
    });

    assert!(left.iter().chain(&right).all(|x| x.is_finite()));
}

#[test]
fn test_interleaved_and_chunked_do_not_allocate() {
    let mut engine = HarmonicExciter::new(EngineConfig::default());
    engine.prepare_to_play(SAMPLE_RATE, BLOCK_SIZE);

    let mut frames = vec![0.25f32; BLOCK_SIZE * 2 * 5 + 6];
    let mut long = sine(BLOCK_SIZE * 3 + 17, 440.0);

    assert_no_alloc(|| {
        engine.update_parameters([(0, 0.9), (4, 0.8)]);
        engine.process_interleaved(&mut frames, 2);
        engine.process(&mut [long.as_mut_slice()]);
        engine.reset();
        engine.process_interleaved(&mut frames, 2);
    });
}
