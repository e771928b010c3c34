//! Benchmarks for the delay matrix and its per-band components.
//!
//! Run with: cargo bench
//!
//! Reference timing at 48kHz sample rate:
//!   - 64 samples  = 1.33ms deadline
//!   - 128 samples = 2.67ms deadline
//!   - 256 samples = 5.33ms deadline
//!   - 512 samples = 10.67ms deadline

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use echograph::dsp::{AlgorithmKind, DelayAlgorithm, SafetyLimiter};
use echograph::graph::band::{DelayBandNode, DelayBandParams};
use echograph::{DelayMatrix, NUM_BANDS};

/// Common buffer sizes used in audio applications.
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

const SAMPLE_RATE: f64 = 48_000.0;

fn test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| ((i as f32 * 0.11).sin() * 0.5) + ((i as f32 * 0.031).sin() * 0.2))
        .collect()
}

fn bench_band(c: &mut Criterion) {
    let mut group = c.benchmark_group("band");

    for &size in BLOCK_SIZES {
        let input = test_signal(size);

        for kind in [
            AlgorithmKind::Digital,
            AlgorithmKind::Analog,
            AlgorithmKind::Tape,
            AlgorithmKind::LoFi,
        ] {
            let mut band = DelayBandNode::new();
            band.prepare(SAMPLE_RATE);
            band.set_params(DelayBandParams {
                delay_time_ms: 250.0,
                feedback: 0.5,
                algorithm: kind,
                ..Default::default()
            });

            let mut left = input.clone();
            let mut right = input.clone();
            let name = format!("{:?}", kind).to_lowercase();
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    left.copy_from_slice(&input);
                    right.copy_from_slice(&input);
                    band.process(black_box(&mut left), black_box(&mut right), 1.0, None, None);
                })
            });
        }

        // Modulated delay time forces the interpolator off integer offsets
        let mut band = DelayBandNode::new();
        band.prepare(SAMPLE_RATE);
        band.set_params(DelayBandParams {
            delay_time_ms: 250.0,
            feedback: 0.5,
            ..Default::default()
        });
        let mod_buffer: Vec<f32> = (0..size).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        let mut left = input.clone();
        let mut right = input.clone();
        group.bench_with_input(BenchmarkId::new("modulated", size), &size, |b, _| {
            b.iter(|| {
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                band.process(
                    black_box(&mut left),
                    black_box(&mut right),
                    1.0,
                    Some(black_box(&mod_buffer)),
                    None,
                );
            })
        });
    }

    group.finish();
}

fn bench_algorithm(c: &mut Criterion) {
    let mut group = c.benchmark_group("algorithm");
    let input = test_signal(512);

    for kind in [
        AlgorithmKind::Digital,
        AlgorithmKind::Analog,
        AlgorithmKind::Tape,
        AlgorithmKind::LoFi,
    ] {
        let mut algorithm = DelayAlgorithm::new(kind);
        algorithm.prepare(SAMPLE_RATE);
        let name = format!("{:?}", kind).to_lowercase();
        group.bench_function(&name, |b| {
            b.iter(|| {
                for &sample in &input {
                    black_box(algorithm.process_sample(black_box(sample)));
                }
            })
        });
    }

    group.finish();
}

fn bench_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("limiter");

    for &size in BLOCK_SIZES {
        let input = test_signal(size);
        let mut limiter = SafetyLimiter::new();
        limiter.prepare(SAMPLE_RATE);

        let mut left = input.clone();
        let mut right = input.clone();
        group.bench_with_input(BenchmarkId::new("chain", size), &size, |b, _| {
            b.iter(|| {
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                limiter.process(black_box(&mut left), black_box(&mut right));
            })
        });
    }

    group.finish();
}

fn bench_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix");

    for &size in BLOCK_SIZES {
        let input = test_signal(size);

        // Full parallel fan-out, all twelve bands
        let mut parallel = DelayMatrix::new();
        parallel.prepare(SAMPLE_RATE);
        parallel.routing_mut().set_default_parallel_routing();
        for band in 0..NUM_BANDS {
            parallel.set_band_params(
                band,
                DelayBandParams {
                    delay_time_ms: 50.0 + band as f32 * 40.0,
                    feedback: 0.4,
                    mod_depth: 0.2,
                    ..Default::default()
                },
            );
        }

        let mut left = input.clone();
        let mut right = input.clone();
        group.bench_with_input(BenchmarkId::new("parallel12", size), &size, |b, _| {
            b.iter(|| {
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                parallel.process(black_box(&mut left), black_box(&mut right));
            })
        });

        // Twelve bands chained in series
        let mut series = DelayMatrix::new();
        series.prepare(SAMPLE_RATE);
        series.routing_mut().set_series_routing();
        for band in 0..NUM_BANDS {
            series.set_band_params(
                band,
                DelayBandParams {
                    delay_time_ms: 30.0 + band as f32 * 10.0,
                    feedback: 0.3,
                    ..Default::default()
                },
            );
        }

        let mut left = input.clone();
        let mut right = input.clone();
        group.bench_with_input(BenchmarkId::new("series12", size), &size, |b, _| {
            b.iter(|| {
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                series.process(black_box(&mut left), black_box(&mut right));
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_band, bench_algorithm, bench_limiter, bench_matrix);
criterion_main!(benches);
