//! Oversampler benchmarks

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use hx_dsp::harmonic::HarmonicGenerator;
use hx_dsp::oversampling::{OversampleFactor, OversampleQuality, Oversampler};

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("oversampler_round_trip");
    let block = 512;
    let input: Vec<f64> = (0..block).map(|i| (i as f64 * 0.05).sin() * 0.5).collect();
    group.throughput(Throughput::Elements(block as u64));

    for factor in [OversampleFactor::X2, OversampleFactor::X4] {
        for quality in [OversampleQuality::Standard, OversampleQuality::High] {
            let mut os = Oversampler::new(factor, quality);
            let mut up = vec![0.0; block * factor.factor()];
            let mut out = vec![0.0; block];
            let id = format!("{}x_{:?}", factor.factor(), quality);

            group.bench_function(BenchmarkId::from_parameter(id), |b| {
                b.iter(|| {
                    os.upsample(black_box(&input), &mut up);
                    os.downsample(&up, &mut out);
                    black_box(&out);
                })
            });
        }
    }

    group.finish();
}

fn bench_shaped(c: &mut Criterion) {
    let generator = HarmonicGenerator::default();
    let mut os = Oversampler::new(OversampleFactor::X4, OversampleQuality::Standard);
    let input: Vec<f64> = (0..512).map(|i| (i as f64 * 0.05).sin() * 0.5).collect();

    c.bench_function("oversampled_shaper_4x_512", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &input {
                acc += os.process_with(x, |v| generator.process(v, 0.8, 0.5));
            }
            black_box(acc)
        })
    });
}

criterion_group!(benches, bench_round_trip, bench_shaped);
criterion_main!(benches);
