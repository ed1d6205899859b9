//! Benchmarks for the in-memory aggregation engine and SQL builders
//!
//! Run with: cargo bench

use chartwise::adapter::memory::{aggregate, RowSet};
use chartwise::adapter::{AdapterOutput, AggregateRow};
use chartwise::query::{DataQuerySpec, Filter, FilterOp};
use chartwise::shaper::shape;
use chartwise::sql::{build_select, BigQueryDialect, SqliteDialect};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

static STATES: [&str; 5] = ["Kentucky", "California", "Texas", "Ohio", "Utah"];

fn create_orders(count: usize) -> RowSet {
    let mut csv = String::from("OrderDate,State,Sales\n");
    for i in 0..count {
        csv.push_str(&format!(
            "{:02}/{:02}/2016,{},{}\n",
            i % 28 + 1,
            i % 12 + 1,
            STATES[i % STATES.len()],
            (i % 500) as f64 * 1.5
        ));
    }
    RowSet::from_reader("bench", csv.as_bytes(), b',').unwrap()
}

fn comparison_spec() -> DataQuerySpec {
    DataQuerySpec::sum("Sales")
        .group_by("OrderDate")
        .split_by("State")
        .filter(Filter::one_of("State", &["Kentucky", "California"]))
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for size in [1_000, 10_000, 100_000] {
        let rows = create_orders(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("count_by_state_{}", size), |b| {
            let spec = DataQuerySpec::count().group_by("State");
            b.iter(|| aggregate(black_box(&spec), black_box(&rows)).unwrap())
        });

        group.bench_function(format!("monthly_comparison_{}", size), |b| {
            let spec = comparison_spec();
            b.iter(|| aggregate(black_box(&spec), black_box(&rows)).unwrap())
        });

        group.bench_function(format!("numeric_filter_{}", size), |b| {
            let spec = DataQuerySpec::average("Sales")
                .group_by("State")
                .filter(Filter::compare("Sales", FilterOp::Gte, 100.0));
            b.iter(|| aggregate(black_box(&spec), black_box(&rows)).unwrap())
        });
    }

    group.finish();
}

fn bench_shape(c: &mut Criterion) {
    let spec = comparison_spec();
    let rows: Vec<AggregateRow> = (0..120)
        .flat_map(|m| {
            let key = format!("{}-{:02}", 2010 + m / 12, m % 12 + 1);
            STATES
                .iter()
                .map(move |s| AggregateRow::new(key.clone(), Some(s.to_string()), m as f64))
        })
        .collect();
    let output = AdapterOutput {
        rows,
        date_bucketed: true,
        statement: None,
        degraded: false,
    };

    c.bench_function("shape_10y_5_series", |b| {
        b.iter(|| shape(black_box(&spec), black_box(&output)))
    });
}

fn bench_sql(c: &mut Criterion) {
    let spec = comparison_spec().filter(Filter::compare("OrderDate", FilterOp::Gte, "01/02/2016"));

    c.bench_function("build_sqlite", |b| {
        b.iter(|| build_select(&SqliteDialect, black_box(&spec), "dataset"))
    });

    c.bench_function("build_bigquery_display", |b| {
        let dialect = BigQueryDialect::default();
        b.iter(|| build_select(&dialect, black_box(&spec), "p.d.t").display())
    });
}

criterion_group!(benches, bench_aggregate, bench_shape, bench_sql);
criterion_main!(benches);
