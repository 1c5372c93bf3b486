//! Benchmarks for chained imputation and the full pipeline
//!
//! Run with: cargo bench --bench pipeline_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;

use churnprep::pipeline::{impute_chained, run_pipeline, ImputeConfig, PipelineConfig};

#[path = "../tests/common/mod.rs"]
mod common;

/// Numeric frame where every third column misses 10% of its values
fn generate_missing_dataframe(n_rows: usize, n_features: usize, seed: u64) -> (DataFrame, Vec<String>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let base: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 100.0).collect();

    let mut columns: Vec<Column> = Vec::with_capacity(n_features);
    let mut targets = Vec::new();
    for i in 0..n_features {
        let name = format!("feature_{}", i);
        let values: Vec<Option<f64>> = base
            .iter()
            .map(|b| {
                let v = b * (i as f64 + 1.0) * 0.1 + rng.gen::<f64>() * 5.0;
                if i % 3 == 0 && rng.gen_bool(0.1) {
                    None
                } else {
                    Some(v)
                }
            })
            .collect();
        if i % 3 == 0 {
            targets.push(name.clone());
        }
        columns.push(Column::new(name.into(), values));
    }

    (DataFrame::new(columns).unwrap(), targets)
}

fn bench_imputation(c: &mut Criterion) {
    let mut group = c.benchmark_group("impute_chained");
    group.sample_size(10);

    for &(rows, features) in &[(1_000, 20), (10_000, 20), (10_000, 60)] {
        let (df, targets) = generate_missing_dataframe(rows, features, 42);
        group.throughput(Throughput::Elements((rows * features) as u64));
        group.bench_with_input(
            BenchmarkId::new("rows_x_features", format!("{}x{}", rows, features)),
            &(df, targets),
            |b, (df, targets)| {
                b.iter(|| impute_chained(black_box(df), black_box(targets), &ImputeConfig::default()))
            },
        );
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_pipeline");
    group.sample_size(10);

    for &rows in &[2_000usize, 10_000] {
        let raw = common::create_telecom_dataframe(rows, 7);
        let config = PipelineConfig::default();
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("rows", rows), &raw, |b, raw| {
            b.iter(|| run_pipeline(black_box(raw.clone()), &config))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_imputation, bench_full_pipeline);
criterion_main!(benches);
