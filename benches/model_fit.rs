//! Model fitting benchmark
//!
//! Measures one OLS fit per specification and a full pipeline run on a
//! synthetic sales table of the documented size (about 1,600 rows) and
//! larger.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench model_fit
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use marginfx::config::AnalysisConfig;
use marginfx::loader::{LoadedData, ValidationReport};
use marginfx::model::{fit, ModelSpec};
use marginfx::pipeline;
use marginfx::transaction::{Period, ProductCategory, Transaction};

fn sales(n: usize) -> Vec<Transaction> {
    (0..n)
        .map(|i| {
            let category = ProductCategory::ALL[(i / 2) % 4];
            let period = if i % 2 == 0 { Period::Before } else { Period::After };
            Transaction {
                margin: 10.0
                    + (i % 4) as f64 * 3.0
                    + period.indicator() * 2.0
                    + ((i * 37) % 10) as f64 * 0.3,
                period,
                category,
                store: (i % 13) as u32 + 1,
                region: "North".to_string(),
            }
        })
        .collect()
}

fn bench_fit_by_model(c: &mut Criterion) {
    let data = sales(1573);
    let mut group = c.benchmark_group("fit_model");

    for spec in ModelSpec::all(13, 1) {
        group.bench_with_input(BenchmarkId::from_parameter(spec.kind.slug()), &spec, |b, spec| {
            b.iter(|| fit(black_box(spec), black_box(&data)));
        });
    }

    group.finish();
}

fn bench_fixed_effects_scaling(c: &mut Criterion) {
    let spec = ModelSpec::store_fixed_effects(13, 1);
    let mut group = c.benchmark_group("fit_store_fe_rows");

    for n in [500, 1573, 10_000] {
        let data = sales(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &data, |b, data| {
            b.iter(|| fit(black_box(&spec), black_box(data)));
        });
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let data = LoadedData {
        transactions: sales(1573),
        validation: ValidationReport::default(),
    };
    let config = AnalysisConfig::default();

    c.bench_function("pipeline_run", |b| {
        b.iter(|| pipeline::run(black_box(&data), black_box(&config)));
    });
}

criterion_group!(
    benches,
    bench_fit_by_model,
    bench_fixed_effects_scaling,
    bench_full_pipeline
);
criterion_main!(benches);
