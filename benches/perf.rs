use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use turf_index::baseline::build_baseline_table;
use turf_index::bias::build_bias_table;
use turf_index::config::EngineConfig;
use turf_index::corpus::parse_result_csv;
use turf_index::index::compute_all;
use turf_index::pipeline::run_pipeline;
use turf_index::synthetic::{SyntheticConfig, generate};

const RESULT_CSV: &str = include_str!("../tests/fixtures/result_202305040911.csv");

fn corpus() -> Vec<turf_index::race::RaceRecord> {
    generate(&SyntheticConfig {
        days_per_venue: 24,
        ..SyntheticConfig::default()
    })
    .races
}

fn bench_result_parse(c: &mut Criterion) {
    c.bench_function("result_csv_parse", |b| {
        b.iter(|| {
            let race = parse_result_csv("202305040911", black_box(RESULT_CSV)).unwrap();
            black_box(race.finishers.len());
        })
    });
}

fn bench_tables(c: &mut Criterion) {
    let races = corpus();
    let cfg = EngineConfig::default();
    c.bench_function("baseline_table", |b| {
        b.iter(|| black_box(build_baseline_table(black_box(&races), &cfg)))
    });
    let (baselines, _) = build_baseline_table(&races, &cfg);
    c.bench_function("bias_table", |b| {
        b.iter(|| black_box(build_bias_table(black_box(&races), &baselines, &cfg)))
    });
    let (biases, _) = build_bias_table(&races, &baselines, &cfg);
    c.bench_function("index_all", |b| {
        b.iter(|| black_box(compute_all(black_box(&races), &baselines, &biases, &cfg)))
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let races = corpus();
    let cfg = EngineConfig::default();
    c.bench_function("pipeline_full", |b| {
        b.iter(|| {
            let out = run_pipeline(black_box(&races), &cfg);
            black_box(out.summary.index.processed);
        })
    });
}

criterion_group!(benches, bench_result_parse, bench_tables, bench_pipeline);
criterion_main!(benches);
