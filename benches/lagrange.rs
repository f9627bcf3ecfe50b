use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

use synodic::physics::lagrange::{BisectionConfig, locate_lagrange_points_with};
use synodic::physics::math::Scalar;
use synodic::sweep::locate_lagrange_points_many;

fn random_mass_ratios(count: usize, seed: u64) -> Vec<Scalar> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count).map(|_| rng.random_range(1e-4..=0.5)).collect()
}

fn bench_single_mass_ratio(c: &mut Criterion) {
    let mut group = c.benchmark_group("lagrange_points");

    for (label, mu) in [("earth_moon", 0.01215), ("equal_masses", 0.5)] {
        for (config_label, tolerance) in [("default", 1e-6), ("tight", 1e-13)] {
            let config = BisectionConfig {
                tolerance,
                ..BisectionConfig::default()
            };
            group.bench_with_input(BenchmarkId::new(label, config_label), &config, |b, config| {
                b.iter(|| {
                    black_box(
                        locate_lagrange_points_with(black_box(mu), config)
                            .expect("valid mass ratio"),
                    )
                });
            });
        }
    }

    group.finish();
}

fn bench_mass_ratio_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("lagrange_sweep");
    let config = BisectionConfig::default();

    for count in [100, 1_000, 10_000] {
        let mass_ratios = random_mass_ratios(count, 42);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(
            BenchmarkId::new("sequential", count),
            &mass_ratios,
            |b, mass_ratios| {
                b.iter(|| {
                    mass_ratios
                        .iter()
                        .map(|&mu| locate_lagrange_points_with(mu, &config))
                        .collect::<Vec<_>>()
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("parallel", count),
            &mass_ratios,
            |b, mass_ratios| {
                b.iter(|| black_box(locate_lagrange_points_many(mass_ratios, &config)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_single_mass_ratio, bench_mass_ratio_sweep);
criterion_main!(benches);
