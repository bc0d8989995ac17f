//! Performance benchmarks for quantization and estimation.
//!
//! Tracks the cost of one estimation pass relative to the number of samples.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use infoplane::mutual_info::{mutual_info_histogram, mutual_info_knn, Method, Quantizer, Schedule};
use infoplane::{BatchLoader, Linear, MutualInfo, MutualInfoConfig, Relu, Sequential};
use ndarray::{Array1, Array2};

fn activations(n: usize, dim: usize) -> Array2<f32> {
    Array2::from_shape_fn((n, dim), |(i, j)| ((i * 7919 + j * 104_729) % 1000) as f32 / 1000.0)
}

/// Benchmark bin search plus quantization for each histogram method
fn bench_quantize(c: &mut Criterion) {
    let mut group = c.benchmark_group("Quantizer");

    for size in [500, 2_000, 8_000].iter() {
        let data = activations(*size, 16);
        group.throughput(Throughput::Elements(*size as u64));
        for method in [Method::Fixed, Method::Quantile, Method::Sign] {
            let quantizer = Quantizer::new(method);
            group.bench_with_input(BenchmarkId::new(method.as_str(), size), size, |b, _| {
                b.iter(|| black_box(quantizer.process("bench", std::slice::from_ref(&data), None)))
            });
        }
    }
    group.finish();
}

/// Benchmark the two estimators
fn bench_estimators(c: &mut Criterion) {
    let mut group = c.benchmark_group("Estimator");

    for size in [500, 2_000].iter() {
        let x = Array1::from_shape_fn(*size, |i| (i % 17) as i64);
        let y = Array1::from_shape_fn(*size, |i| (i % 5) as i64);
        group.bench_with_input(BenchmarkId::new("histogram", size), size, |b, _| {
            b.iter(|| black_box(mutual_info_histogram(&x, &y)))
        });

        let xc = activations(*size, 4).mapv(f64::from);
        let yc = activations(*size, 1).mapv(|v| f64::from(v).round());
        group.bench_with_input(BenchmarkId::new("knn", size), size, |b, _| {
            b.iter(|| black_box(mutual_info_knn(&xc, &yc, 3)))
        });
    }
    group.finish();
}

/// Benchmark a full pass over a three-layer network, parallel vs sequential
fn bench_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pass");

    for parallel in [false, true] {
        let mut model = Sequential::new()
            .with_layer("fc1", Linear::new(16, 64, 1))
            .with_layer("relu1", Relu)
            .with_layer("fc2", Linear::new(64, 32, 2))
            .with_layer("relu2", Relu)
            .with_layer("fc3", Linear::new(32, 10, 3));
        let config = MutualInfoConfig::default()
            .with_listen_schedule(Schedule::always())
            .with_parallel(parallel);
        let mut mi = MutualInfo::new(config).unwrap();
        for name in ["relu1", "relu2", "fc3"] {
            mi.register_from(&model, name).unwrap();
        }
        let labels = Array1::from_shape_fn(2_000, |i| (i % 10) as i64);
        mi.prepare(BatchLoader::new(activations(2_000, 16), labels, 250).unwrap())
            .unwrap();

        let name = if parallel { "parallel" } else { "sequential" };
        group.bench_function(name, |b| {
            b.iter(|| {
                mi.update(&mut model, 0, 0).unwrap();
                black_box(mi.take_information())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_quantize, bench_estimators, bench_pass);
criterion_main!(benches);
