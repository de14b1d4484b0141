use std::path::{Path, PathBuf};

use polars::prelude::*;
use table_bench::backend::{normalize, PASSENGER_COUNT};
use table_bench::dataset::{self, SIZE_FRACTIONS};
use table_bench::{
    available_benchmarks, construct, run_persisted_benchmarks, BackendKind, BackendSelection,
    BenchReport, Operation,
};

fn write_parquet(path: &Path, df: &mut DataFrame) {
    let mut file = std::fs::File::create(path).unwrap();
    ParquetWriter::new(&mut file).finish(df).unwrap();
}

/// Two files: text timestamps with integer counts, and native timestamps
/// with float counts.
fn write_dataset(dir: &Path) -> Vec<PathBuf> {
    let mut first = df!(
        "vendor_id" => &["CMT", "VTS", "VTS", "CMT"],
        "passenger_count" => &[0i64, 2, 2, 1],
        "total_amount" => &[10.0f64, 20.0, 30.0, 5.5],
        "pickup_at" => &[
            "2019-01-01 00:10:00",
            "2019-03-04 12:00:00",
            "2019-03-04 13:30:00",
            "2020-06-01 08:00:00",
        ],
        "trip_distance" => &[1.2f64, 2.5, 2.6, 0.4],
        "store_and_fwd_flag" => &["N", "N", "Y", "N"],
    )
    .unwrap();

    let second_raw = df!(
        "vendor_id" => &["VTS", "DDS", "VTS", "CMT", "VTS"],
        "passenger_count" => &[-3.0f64, 2.0, 1.0, 2.0, 1.0],
        "total_amount" => &[4.5f64, 8.0, 12.0, 16.0, 2.0],
        "pickup_at" => &[
            "2020-06-01 09:15:00",
            "2019-12-31 23:59:59",
            "2020-01-01 00:00:00",
            "2020-02-02 02:02:02",
            "2019-07-07 07:07:07",
        ],
        "trip_distance" => &[9.9f64, 3.49, 1.0, 2.51, 0.5],
    )
    .unwrap();
    let mut second = second_raw
        .lazy()
        .with_column(col("pickup_at").str().to_datetime(
            Some(TimeUnit::Milliseconds),
            None,
            StrptimeOptions::default(),
            lit("raise"),
        ))
        .collect()
        .unwrap();

    let nested = dir.join("2020");
    std::fs::create_dir_all(&nested).unwrap();
    let a = dir.join("part-0.parquet");
    let b = nested.join("part-1.parquet");
    write_parquet(&a, &mut first);
    write_parquet(&b, &mut second);
    vec![b, a]
}

#[test]
fn every_backend_returns_identical_tables() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let files = dataset::discover(dir.path()).unwrap();
    let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();

    let reference = construct(BackendKind::Polars, &paths).unwrap();
    let expected = [
        reference.query1().unwrap(),
        reference.query2().unwrap(),
        reference.query3().unwrap(),
        reference.query4().unwrap(),
    ];
    assert_eq!(expected[0].height(), 3);

    for kind in [BackendKind::PolarsLazy, BackendKind::Sqlite, BackendKind::Native] {
        let backend = construct(kind, &paths).unwrap();
        assert_eq!(backend.kind(), kind);
        let actual = [
            backend.query1().unwrap(),
            backend.query2().unwrap(),
            backend.query3().unwrap(),
            backend.query4().unwrap(),
        ];
        for (i, (got, want)) in actual.iter().zip(expected.iter()).enumerate() {
            assert!(got.equals_missing(want), "{} query {} differs:\n{}\n{}", kind, i + 1, got, want);
        }
    }
}

#[test]
fn parse_cleans_non_positive_counts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.parquet");
    let mut tiny = df!(
        "vendor_id" => &["1", "2", "2"],
        "passenger_count" => &[0i32, 2, 2],
        "total_amount" => &[3.0f64, 4.0, 5.0],
        "pickup_at" => &["2019-01-01 00:00:00", "2019-01-01 00:00:01", "2019-01-01 00:00:02"],
        "trip_distance" => &[1.0f64, 1.0, 1.0],
    )
    .unwrap();
    write_parquet(&path, &mut tiny);

    let cleaned = normalize(LazyFrame::scan_parquet(&path, ScanArgsParquet::default()).unwrap())
        .unwrap()
        .collect()
        .unwrap();
    let counts: Vec<Option<i64>> = cleaned
        .column(PASSENGER_COUNT)
        .unwrap()
        .as_materialized_series()
        .i64()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(counts, vec![Some(1), Some(2), Some(2)]);

    for kind in BackendKind::ALL {
        let backend = construct(kind, &[path.clone()]).unwrap();
        let q2 = backend.query2().unwrap();
        let keys: Vec<Option<i64>> = q2
            .column(PASSENGER_COUNT)
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(keys, vec![Some(1), Some(2)], "{}", kind);
    }
}

#[test]
fn persisted_run_over_all_fractions() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("tmp");
    std::fs::create_dir_all(&data).unwrap();
    write_dataset(&data);
    let output = dir.path().join("report").join("results.json");

    let files = dataset::discover(&data).unwrap();
    let selection = BackendSelection::parse("native, SQLite").unwrap();
    let benches: Vec<_> = available_benchmarks(&selection, &files, &SIZE_FRACTIONS).collect();
    assert_eq!(benches.len(), SIZE_FRACTIONS.len() * 2 * Operation::ALL.len());

    let contexts: Vec<_> = benches.iter().map(|b| b.context().clone()).collect();
    let report = run_persisted_benchmarks(benches, 2, &output).unwrap();

    assert!(report.results.iter().all(|r| r.error.is_none()), "{:?}", report);
    assert!(report.results.iter().all(|r| r.iterations == 2));
    assert!(contexts.iter().all(|c| !c.is_parsed()));

    // two distinct prefixes: one file, then both
    let mut slices: Vec<u64> = report.results.iter().map(|r| r.dataset_bytes).collect();
    slices.sort();
    slices.dedup();
    assert_eq!(slices.len(), 2);
    assert_eq!(report.results.len(), slices.len() * 2 * Operation::ALL.len());

    let on_disk = BenchReport::load(&output).unwrap();
    assert_eq!(on_disk.results.len(), report.results.len());
}

#[test]
fn queries_need_a_parse_first() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let files = dataset::discover(dir.path()).unwrap();
    let selection = BackendSelection::parse("polars").unwrap();
    let benches: Vec<_> = available_benchmarks(&selection, &files, &[1.0]).collect();

    assert!(benches[1].run().is_err());
    assert!(benches[0].run().unwrap().is_none());
    for bench in &benches[1..] {
        let table = bench.run().unwrap().unwrap();
        assert!(table.height() > 0);
    }

    benches[0].context().reset();
    assert!(benches[4].run().is_err());
}
