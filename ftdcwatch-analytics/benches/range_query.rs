use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ftdcwatch_analytics::catalog::all_metrics;
use ftdcwatch_analytics::range::filter;
use ftdcwatch_analytics::{Assessment, DerivedSeries, Percentiles, TimeSeriesStore};
use ftdcwatch_types::{DataPoint, TimeSeries};

const START_MS: f64 = 1_700_000_000_000.0;

fn series(name: &str, points: usize) -> TimeSeries {
    TimeSeries::with_points(
        name,
        (0..points)
            .map(|i| DataPoint::new((i % 97) as f64, START_MS + i as f64 * 1000.0))
            .collect(),
    )
}

fn populated_store(points: usize) -> TimeSeriesStore {
    let mut derived = DerivedSeries::default();
    for name in all_metrics() {
        derived.series.insert(name.to_string(), series(name, points));
    }
    let store = TimeSeriesStore::new();
    store.merge(derived, None);
    store
}

/// Window slicing plus downsampling at several series lengths
fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");

    for points in [1_000usize, 10_000, 86_400].iter() {
        let s = series("ops_query", *points);
        let to = START_MS + *points as f64 * 1000.0;
        group.bench_with_input(BenchmarkId::from_parameter(points), &s, |b, s| {
            b.iter(|| filter(black_box(s), black_box(START_MS), black_box(to)));
        });
    }
    group.finish();
}

/// Nearest-rank percentiles over a one-day window
fn bench_percentiles(c: &mut Criterion) {
    let s = series("latency_read", 86_400);
    let to = START_MS + 86_400.0 * 1000.0;

    c.bench_function("percentiles_one_day", |b| {
        b.iter(|| Percentiles::of_window(black_box(&s), START_MS, to));
    });
}

/// Full assessment across the catalog
fn bench_assessment(c: &mut Criterion) {
    let store = populated_store(3_600);
    let to = START_MS + 3_600.0 * 1000.0;

    c.bench_function("assessment_one_hour", |b| {
        b.iter(|| {
            let data = store.read();
            Assessment::new(&data).table(black_box(START_MS), black_box(to))
        });
    });
}

criterion_group!(benches, bench_filter, bench_percentiles, bench_assessment);
criterion_main!(benches);
