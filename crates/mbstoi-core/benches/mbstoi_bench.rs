//! MBSTOI Benchmarks
//!
//! Measures the EC search at several grid coarseness values and the full
//! evaluation pipeline.
//!
//! Run with: cargo bench -p mbstoi-core --bench mbstoi_bench
//! Parallel: cargo bench -p mbstoi-core --features parallel --bench mbstoi_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::time::Duration;

use mbstoi_core::ec::{num_windows, BinauralSpectra, EcSearch};
use mbstoi_core::prelude::*;
use mbstoi_core::{BandGrid, StftProcessor, ThirdOctaveBands};

/// Amplitude-modulated noise, a rough stand-in for a speech envelope
fn speech_like(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    (0..len)
        .map(|i| normal.sample(&mut rng) * (1.1 + (i as f64 * 0.0025).sin()))
        .collect()
}

fn noisy_pair(len: usize, snr_db: f64) -> (StereoSignal, StereoSignal) {
    let clean = StereoSignal::new(speech_like(len, 1), speech_like(len, 2)).unwrap();
    let gain = 10f64.powf(-snr_db / 20.0);
    let mut rng = StdRng::seed_from_u64(3);
    let normal = Normal::new(0.0, gain).unwrap();
    let degraded = clean.map_channels(|x| x.iter().map(|v| v + normal.sample(&mut rng)).collect());
    (clean, degraded)
}

/// Benchmark the EC search for different grid sizes
fn bench_ec_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("ec_search");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    let (clean, degraded) = noisy_pair(30_000, 0.0);
    let mut stft = StftProcessor::new(256, 512).unwrap();
    let xl = stft.single_sided(clean.left());
    let xr = stft.single_sided(clean.right());
    let yl = stft.single_sided(degraded.left());
    let yr = stft.single_sided(degraded.right());
    let spectra = BinauralSpectra::new(&xl, &xr, &yl, &yr).unwrap();
    let bands = ThirdOctaveBands::new(10_000.0, 512, 15, 150.0).unwrap();
    let omegas = bands.angular_center_frequencies();
    let windows = num_windows(spectra.frames(), 30);

    for coarseness in [1usize, 2, 5].iter() {
        let params = MbstoiParams::builder().grid_coarseness(*coarseness).build();
        let grid = params.ec_grid();
        let search = EcSearch::from_bands(spectra, &bands, &omegas, 30, &grid).unwrap();

        group.throughput(Throughput::Elements((15 * windows * grid.len()) as u64));
        group.bench_with_input(BenchmarkId::new("sequential", coarseness), &search, |b, search| {
            b.iter(|| {
                let mut d = BandGrid::zeros(15, windows);
                let mut p = BandGrid::zeros(15, windows);
                search.run(&mut d, &mut p).unwrap();
                black_box(d)
            })
        });

        #[cfg(feature = "parallel")]
        group.bench_with_input(BenchmarkId::new("parallel", coarseness), &search, |b, search| {
            b.iter(|| {
                let mut d = BandGrid::zeros(15, windows);
                let mut p = BandGrid::zeros(15, windows);
                mbstoi_core::parallel::par_ec_search(search, &mut d, &mut p).unwrap();
                black_box(d)
            })
        });
    }

    group.finish();
}

/// Benchmark the full pipeline including resampling
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for &fs in [10_000.0f64, 44_100.0].iter() {
        let (clean, degraded) = noisy_pair((fs * 3.0) as usize, 5.0);
        let evaluator = Mbstoi::new(MbstoiParams::builder().grid_coarseness(2).build()).unwrap();

        group.bench_with_input(BenchmarkId::new("evaluate", fs as u64), &fs, |b, &fs| {
            b.iter(|| evaluator.score(black_box(&clean), black_box(&degraded), fs).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ec_search, bench_pipeline);
criterion_main!(benches);
