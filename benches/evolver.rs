//! Steady-state search throughput.
//!
//! - Raw search loop against an in-process sphere cost
//! - Full calibration through links and a quadratic cost node
//! - One equilibration of the reference network

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use coupler::domain::models::{EvolverConfig, ParameterDescriptor, SearchBounds};
use coupler::services::{CalibrationRig, NetworkRig, SteadyStateSearch};
use coupler::{Config, CouplingResult};

fn sphere(values: &[f64]) -> CouplingResult<f64> {
    Ok(values.iter().map(|v| (v - 0.5) * (v - 0.5)).sum())
}

fn search_config(dims: usize, evaluations: usize) -> EvolverConfig {
    EvolverConfig {
        max_evaluations: evaluations,
        seed: Some(1),
        parameters: (0..dims)
            .map(|k| ParameterDescriptor::new(format!("p{k}"), -100.0, 100.0, 0.0).unwrap())
            .collect(),
        ..EvolverConfig::default()
    }
}

fn bench_search_dimensions(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_dimensions");
    let evaluations = 10_000;
    group.throughput(Throughput::Elements(evaluations as u64));

    for dims in [1, 4, 16] {
        let config = search_config(dims, evaluations);
        let bounds = SearchBounds::from_parameters(&config.parameters).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(dims), &dims, |b, _| {
            b.iter(|| {
                let search = SteadyStateSearch::new(&config, &bounds, ChaCha8Rng::seed_from_u64(1));
                black_box(search.run(sphere).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_linked_calibration(c: &mut Criterion) {
    let mut config = Config::default();
    config.evolver.seed = Some(1);
    config.evolver.max_evaluations = 2_000;

    c.bench_function("linked_calibration_2000", |b| {
        b.iter(|| {
            let rig = CalibrationRig::build(&config).unwrap();
            black_box(rig.run().unwrap())
        });
    });
}

fn bench_equilibration(c: &mut Criterion) {
    let config = Config::default();
    c.bench_function("reference_network_solve", |b| {
        b.iter(|| {
            let rig = NetworkRig::build(&config).unwrap();
            black_box(rig.solve().unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_search_dimensions,
    bench_linked_calibration,
    bench_equilibration
);
criterion_main!(benches);
