//! Full engine benchmarks: gated oversampling vs direct path only

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use hx_dsp::{EngineConfig, EngineParam, HarmonicExciter};

const SAMPLE_RATE: f64 = 48000.0;

fn engine(threshold: f64, drive: f64, block: usize) -> HarmonicExciter {
    let mut engine = HarmonicExciter::new(EngineConfig {
        oversample_threshold: threshold,
        ..EngineConfig::default()
    });
    engine.set_parameter(EngineParam::Drive as u32, drive);
    engine.prepare_to_play(SAMPLE_RATE, block);
    engine
}

fn signal(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.3 * (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / SAMPLE_RATE).sin())
        .collect()
}

fn bench_engine_gating(c: &mut Criterion) {
    let mut group = c.benchmark_group("exciter_stereo");

    for block in [64, 256, 1024] {
        group.throughput(Throughput::Elements((block * 2) as u64));

        for (label, threshold) in [("gated", 0.3), ("direct_only", 1.0)] {
            let mut exciter = engine(threshold, 0.8, block);
            let mut left = signal(block);
            let mut right = signal(block);

            group.bench_with_input(BenchmarkId::new(label, block), &block, |b, _| {
                let mut buffers = [left.as_mut_slice(), right.as_mut_slice()];
                b.iter(|| exciter.process(black_box(&mut buffers[..])))
            });
        }
    }

    group.finish();
}

fn bench_light_drive(c: &mut Criterion) {
    // below the gate threshold in every band
    let mut exciter = engine(0.3, 0.2, 512);
    let mut left = signal(512);
    let mut right = signal(512);

    c.bench_function("exciter_light_drive_512", |b| {
        let mut buffers = [left.as_mut_slice(), right.as_mut_slice()];
        b.iter(|| exciter.process(black_box(&mut buffers[..])))
    });
}

fn bench_interleaved_f32(c: &mut Criterion) {
    let mut exciter = engine(0.3, 0.8, 512);
    let mut frames: Vec<f32> = signal(1024).iter().map(|&x| x as f32).collect();

    c.bench_function("exciter_interleaved_f32_512", |b| {
        b.iter(|| {
            exciter.process_interleaved(black_box(frames.as_mut_slice()), 2);
        })
    });
}

criterion_group!(benches, bench_engine_gating, bench_light_drive, bench_interleaved_f32);
criterion_main!(benches);
