use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stratfit_core::LeverVector;
use stratfit_engine::{aggregate_default, generate_batch, simulate, PathConfig, PathParams, SimConfig};

fn bench_paths(c: &mut Criterion) {
    let params = PathParams {
        growth_rate: 1.2,
        market_expansion: 1.1,
        operational_risk: 1.3,
    };
    let cfg = PathConfig::default();
    c.bench_function("generate 10k paths x 36m", |b| {
        b.iter(|| black_box(generate_batch(&params, 42, 10_000, &cfg)))
    });

    let paths = generate_batch(&params, 42, 10_000, &cfg);
    c.bench_function("aggregate 10k paths", |b| {
        b.iter(|| black_box(aggregate_default(&paths)))
    });
}

fn bench_summary(c: &mut Criterion) {
    let levers = LeverVector::neutral();
    let cfg = SimConfig::default();
    c.bench_function("simulate neutral 500 paths", |b| {
        b.iter(|| black_box(simulate(&levers, "bench", &cfg)))
    });
}

criterion_group!(benches, bench_paths, bench_summary);
criterion_main!(benches);
