//! Benchmarks for the online quantizer.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};

use broca::quantizer::{GasParams, GrowingGas};

fn random_vectors(dim: usize, count: usize) -> Vec<Vec<f32>> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    (0..count)
        .map(|_| (0..dim).map(|_| rng.r#gen::<f32>()).collect())
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let inputs = random_vectors(64, 1024);

    c.bench_function("insert_64d", |bench| {
        bench.iter(|| {
            let mut gas = GrowingGas::new(GasParams::with_dimension(64));
            for v in &inputs {
                black_box(gas.insert(v).unwrap());
            }
            gas.len()
        })
    });
}

fn bench_classify(c: &mut Criterion) {
    let inputs = random_vectors(64, 1024);
    let mut gas = GrowingGas::new(GasParams::with_dimension(64));
    for v in &inputs {
        gas.insert(v).unwrap();
    }
    let probes = random_vectors(64, 256);

    c.bench_function("classify_64d", |bench| {
        bench.iter(|| {
            for p in &probes {
                black_box(gas.classify(p).unwrap());
            }
        })
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let inputs = random_vectors(64, 1024);
    let mut gas = GrowingGas::new(GasParams::with_dimension(64));
    for v in &inputs {
        gas.insert(v).unwrap();
    }

    c.bench_function("snapshot_64d", |bench| {
        bench.iter(|| black_box(gas.snapshot()))
    });
}

criterion_group!(benches, bench_insert, bench_classify, bench_snapshot);
criterion_main!(benches);
