//! Table engines under benchmark.
//!
//! Every engine builds the same cleaned trips table and answers the same four
//! queries with identical column names, dtypes and row order, so the outputs
//! of any two engines can be compared directly.

pub mod native;
pub mod polars_eager;
pub mod polars_lazy;
pub mod sqlite;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

pub use native::NativeBackend;
pub use polars_eager::PolarsBackend;
pub use polars_lazy::PolarsLazyBackend;
pub use sqlite::SqliteBackend;

pub const VENDOR_ID: &str = "vendor_id";
pub const PASSENGER_COUNT: &str = "passenger_count";
pub const TOTAL_AMOUNT: &str = "total_amount";
pub const PICKUP_AT: &str = "pickup_at";
pub const TRIP_DISTANCE: &str = "trip_distance";
pub const YEAR: &str = "year";
pub const COUNTS: &str = "counts";

/// Layout of `pickup_at` when the source stores it as text.
pub const PICKUP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendKind {
    Polars,
    PolarsLazy,
    Sqlite,
    Native,
}

impl BackendKind {
    /// Priority order used when enumerating benchmarks.
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Polars,
        BackendKind::PolarsLazy,
        BackendKind::Sqlite,
        BackendKind::Native,
    ];

    pub const DEFAULT: [BackendKind; 3] = [
        BackendKind::Polars,
        BackendKind::PolarsLazy,
        BackendKind::Sqlite,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Polars => "Polars",
            BackendKind::PolarsLazy => "Polars-Lazy",
            BackendKind::Sqlite => "SQLite",
            BackendKind::Native => "Native",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "polars" => Ok(BackendKind::Polars),
            "polars-lazy" | "polars_lazy" => Ok(BackendKind::PolarsLazy),
            "sqlite" => Ok(BackendKind::Sqlite),
            "native" => Ok(BackendKind::Native),
            _ => Err(BenchError::UnknownBackend(s.trim().to_string())),
        }
    }
}

/// Uniform contract over the engines: construction is the Parse step,
/// the four queries run against what it built.
pub trait TableBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Row count per `vendor_id`.
    fn query1(&self) -> Result<DataFrame>;

    /// Mean `total_amount` per `passenger_count`.
    fn query2(&self) -> Result<DataFrame>;

    /// Row count per (`passenger_count`, pickup year).
    fn query3(&self) -> Result<DataFrame>;

    /// Row count per (`passenger_count`, pickup year, rounded distance),
    /// ordered by year then descending count.
    fn query4(&self) -> Result<DataFrame>;
}

/// Parse step: read `paths` into the engine selected by `kind`.
pub fn construct(kind: BackendKind, paths: &[PathBuf]) -> Result<Box<dyn TableBackend>> {
    if paths.is_empty() {
        return Err(BenchError::EmptyInput);
    }

    Ok(match kind {
        BackendKind::Polars => Box::new(PolarsBackend::from_paths(paths)?),
        BackendKind::PolarsLazy => Box::new(PolarsLazyBackend::from_paths(paths)?),
        BackendKind::Sqlite => Box::new(SqliteBackend::from_paths(paths)?),
        BackendKind::Native => Box::new(NativeBackend::from_paths(paths)?),
    })
}

/// Read every parquet file and stack them into one cleaned frame.
pub fn read_trips(paths: &[PathBuf]) -> Result<DataFrame> {
    let mut combined: Option<DataFrame> = None;

    for path in paths {
        let file = std::fs::File::open(path)?;
        let df = ParquetReader::new(file).finish()?;
        let df = normalize(df.lazy())?.collect()?;

        match combined.as_mut() {
            Some(acc) => {
                acc.vstack_mut(&df)?;
            }
            None => combined = Some(df),
        }
    }

    let mut df = combined.ok_or(BenchError::EmptyInput)?;
    df.as_single_chunk_par();
    Ok(df)
}

/// Project the five trip columns onto their canonical dtypes and replace
/// non-positive passenger counts with 1.
pub fn normalize(mut lf: LazyFrame) -> Result<LazyFrame> {
    let schema = lf.collect_schema()?;
    let pickup = match schema.get(PICKUP_AT) {
        Some(DataType::String) => col(PICKUP_AT).str().to_datetime(
            Some(TimeUnit::Microseconds),
            None,
            StrptimeOptions {
                format: Some(PICKUP_FORMAT.into()),
                ..Default::default()
            },
            lit("raise"),
        ),
        _ => col(PICKUP_AT).cast(DataType::Datetime(TimeUnit::Microseconds, None)),
    };

    let count = col(PASSENGER_COUNT).cast(DataType::Int64);

    Ok(lf.select([
        col(VENDOR_ID).cast(DataType::String),
        when(count.clone().lt(lit(1i64)))
            .then(lit(1i64))
            .otherwise(count)
            .alias(PASSENGER_COUNT),
        col(TOTAL_AMOUNT).cast(DataType::Float64),
        pickup.alias(PICKUP_AT),
        col(TRIP_DISTANCE).cast(DataType::Float64),
    ]))
}

fn pickup_year() -> Expr {
    col(PICKUP_AT).dt().year().cast(DataType::Int64).alias(YEAR)
}

fn counts() -> Expr {
    len().cast(DataType::Int64).alias(COUNTS)
}

/// Round to the nearest integer, ties to even (2.5 -> 2, 3.5 -> 4).
pub fn round_half_even(value: Expr) -> Expr {
    let floor = value.clone().floor();
    let frac = value - floor.clone();
    when(frac.clone().gt(lit(0.5)))
        .then(floor.clone() + lit(1.0))
        .when(frac.lt(lit(0.5)))
        .then(floor.clone())
        .when((floor.clone() % lit(2.0)).eq(lit(0.0)))
        .then(floor.clone())
        .otherwise(floor + lit(1.0))
}

fn not_null(keys: &[&str]) -> Expr {
    keys.iter()
        .map(|k| col(*k).is_not_null())
        .reduce(|acc, e| acc.and(e))
        .unwrap_or_else(|| lit(true))
}

// Rows with a null group key are dropped before aggregating.

pub fn query1_plan(lf: LazyFrame) -> LazyFrame {
    lf.select([col(VENDOR_ID)])
        .filter(not_null(&[VENDOR_ID]))
        .group_by([col(VENDOR_ID)])
        .agg([counts()])
        .sort_by_exprs(vec![col(VENDOR_ID)], SortMultipleOptions::default())
}

pub fn query2_plan(lf: LazyFrame) -> LazyFrame {
    lf.select([col(PASSENGER_COUNT), col(TOTAL_AMOUNT)])
        .filter(not_null(&[PASSENGER_COUNT]))
        .group_by([col(PASSENGER_COUNT)])
        .agg([col(TOTAL_AMOUNT).mean()])
        .sort_by_exprs(vec![col(PASSENGER_COUNT)], SortMultipleOptions::default())
}

pub fn query3_plan(lf: LazyFrame) -> LazyFrame {
    lf.select([col(PASSENGER_COUNT), pickup_year()])
        .filter(not_null(&[PASSENGER_COUNT, YEAR]))
        .group_by([col(PASSENGER_COUNT), col(YEAR)])
        .agg([counts()])
        .sort_by_exprs(
            vec![col(PASSENGER_COUNT), col(YEAR)],
            SortMultipleOptions::default(),
        )
}

pub fn query4_plan(lf: LazyFrame) -> LazyFrame {
    lf.select([
        col(PASSENGER_COUNT),
        pickup_year(),
        round_half_even(col(TRIP_DISTANCE))
            .cast(DataType::Int64)
            .alias(TRIP_DISTANCE),
    ])
    .filter(not_null(&[PASSENGER_COUNT, YEAR, TRIP_DISTANCE]))
    .group_by([col(PASSENGER_COUNT), col(YEAR), col(TRIP_DISTANCE)])
    .agg([counts()])
    .sort_by_exprs(
        vec![
            col(YEAR),
            col(COUNTS),
            col(PASSENGER_COUNT),
            col(TRIP_DISTANCE),
        ],
        SortMultipleOptions::default().with_order_descending_multi([false, true, false, false]),
    )
}

/// One decoded row of the cleaned table, for engines that do not speak Arrow.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub vendor_id: Option<String>,
    pub passenger_count: Option<i64>,
    pub total_amount: Option<f64>,
    /// Microseconds since the Unix epoch.
    pub pickup_at: Option<i64>,
    pub trip_distance: Option<f64>,
}

/// Decode a cleaned frame (see [`normalize`]) into rows.
pub fn trips_from_frame(df: &DataFrame) -> Result<Vec<Trip>> {
    let vendor = df.column(VENDOR_ID)?.as_materialized_series();
    let count = df.column(PASSENGER_COUNT)?.as_materialized_series();
    let amount = df.column(TOTAL_AMOUNT)?.as_materialized_series();
    let pickup = df
        .column(PICKUP_AT)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let distance = df.column(TRIP_DISTANCE)?.as_materialized_series();

    let trips = vendor
        .str()?
        .into_iter()
        .zip(count.i64()?.into_iter())
        .zip(amount.f64()?.into_iter())
        .zip(pickup.i64()?.into_iter())
        .zip(distance.f64()?.into_iter())
        .map(|((((vendor_id, passenger_count), total_amount), pickup_at), trip_distance)| Trip {
            vendor_id: vendor_id.map(str::to_string),
            passenger_count,
            total_amount,
            pickup_at,
            trip_distance,
        })
        .collect();

    Ok(trips)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn parses_backend_names_case_insensitively() {
        assert_eq!("Polars".parse::<BackendKind>().unwrap(), BackendKind::Polars);
        assert_eq!(" SQLITE ".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert_eq!(
            "polars-lazy".parse::<BackendKind>().unwrap(),
            BackendKind::PolarsLazy
        );
        assert!(matches!(
            "pandas".parse::<BackendKind>(),
            Err(BenchError::UnknownBackend(name)) if name == "pandas"
        ));
    }

    #[test]
    fn normalize_replaces_non_positive_counts() {
        let df = cleaned_trips();
        let counts: Vec<Option<i64>> = df
            .column(PASSENGER_COUNT)
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            counts,
            vec![Some(1), Some(2), Some(2), Some(1), Some(1), Some(2), Some(1), Some(2), Some(1)]
        );
    }

    #[test]
    fn normalize_parses_pickup_strings() {
        let df = cleaned_trips();
        assert_eq!(
            df.column(PICKUP_AT).unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Microseconds, None)
        );
    }

    #[test]
    fn decodes_rows_from_frame() {
        let trips = trips_from_frame(&cleaned_trips()).unwrap();
        assert_eq!(trips.len(), 9);
        assert_eq!(trips[0].vendor_id.as_deref(), Some("CMT"));
        assert_eq!(trips[0].passenger_count, Some(1));
        // 2019-01-01 00:10:00 UTC
        assert_eq!(trips[0].pickup_at, Some(1_546_301_400_000_000));
    }

    #[test]
    fn construct_rejects_empty_input() {
        assert!(matches!(
            construct(BackendKind::Polars, &[]),
            Err(BenchError::EmptyInput)
        ));
    }

    #[test]
    fn rounds_ties_to_even() {
        let df = df!("x" => &[0.5f64, 1.5, 2.5, -0.5, -1.5, 2.49, 2.51, 3.0])
            .unwrap()
            .lazy()
            .select([round_half_even(col("x")).cast(DataType::Int64)])
            .collect()
            .unwrap();
        let values: Vec<Option<i64>> = df
            .column("x")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            values,
            vec![Some(0), Some(2), Some(2), Some(0), Some(-2), Some(2), Some(3), Some(3)]
        );
    }

    #[test]
    fn null_keys_are_dropped_from_every_query() {
        let df = df!(
            VENDOR_ID => &[None, Some("CMT"), Some("CMT")],
            PASSENGER_COUNT => &[Some(1i64), None, Some(2)],
            TOTAL_AMOUNT => &[1.0f64, 2.0, 3.0],
            PICKUP_AT => &[Some(0i64), Some(0), None],
            TRIP_DISTANCE => &[Some(1.0f64), Some(1.0), Some(1.0)],
        )
        .unwrap()
        .lazy()
        .with_column(col(PICKUP_AT).cast(DataType::Datetime(TimeUnit::Microseconds, None)));

        let q1 = query1_plan(df.clone()).collect().unwrap();
        assert_eq!(q1.height(), 1);
        assert_eq!(q1.column(VENDOR_ID).unwrap().null_count(), 0);

        let q2 = query2_plan(df.clone()).collect().unwrap();
        assert_eq!(q2.height(), 2);
        assert_eq!(q2.column(PASSENGER_COUNT).unwrap().null_count(), 0);

        // only the first row has every Query 3 and Query 4 key
        assert_eq!(query3_plan(df.clone()).collect().unwrap().height(), 1);
        assert_eq!(query4_plan(df).collect().unwrap().height(), 1);
    }

    #[test]
    fn numeric_vendor_ids_sort_as_text() {
        let raw = df!(
            VENDOR_ID => &[2i64, 10, 2],
            PASSENGER_COUNT => &[1i64, 1, 1],
            TOTAL_AMOUNT => &[1.0f64, 1.0, 1.0],
            PICKUP_AT => &["2019-01-01 00:00:00"; 3],
            TRIP_DISTANCE => &[1.0f64, 1.0, 1.0],
        )
        .unwrap();
        let q1 = query1_plan(normalize(raw.lazy()).unwrap()).collect().unwrap();
        let vendors: Vec<Option<&str>> = q1
            .column(VENDOR_ID)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(vendors, vec![Some("10"), Some("2")]);
    }
}
