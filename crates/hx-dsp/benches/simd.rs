//! SIMD dispatch benchmarks

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use hx_dsp::simd::{DspDispatch, dot_f64x4, dot_scalar, simd_level};

fn bench_dot(c: &mut Criterion) {
    let mut group = c.benchmark_group("dot");

    for size in [64, 96, 256, 384] {
        let a: Vec<f64> = (0..size).map(|i| (i as f64 * 0.001).sin()).collect();
        let b: Vec<f64> = (0..size).map(|i| (i as f64 * 0.002).cos()).collect();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("scalar", size), &size, |bench, _| {
            bench.iter(|| dot_scalar(black_box(&a), black_box(&b)))
        });
        group.bench_with_input(BenchmarkId::new("f64x4", size), &size, |bench, _| {
            bench.iter(|| dot_f64x4(black_box(&a), black_box(&b)))
        });
        group.bench_with_input(BenchmarkId::new("dispatch", size), &size, |bench, _| {
            let dot = DspDispatch::get().dot;
            bench.iter(|| dot(black_box(&a), black_box(&b)))
        });
    }

    group.finish();
}

fn bench_simd_detection(c: &mut Criterion) {
    c.bench_function("simd_level_cached", |b| b.iter(|| black_box(simd_level())));
}

criterion_group!(benches, bench_dot, bench_simd_detection);
criterion_main!(benches);
