//! SQLite engine (via rusqlite), in-memory database.
//!
//! Trips are loaded into a single `trips` table; `pickup_at` is stored as
//! microseconds since the epoch and the year is derived in SQL.

use std::path::PathBuf;

use polars::prelude::*;
use rusqlite::{params, Connection};
use tracing::debug;

use super::{
    read_trips, trips_from_frame, BackendKind, TableBackend, Trip, COUNTS, PASSENGER_COUNT,
    TOTAL_AMOUNT, TRIP_DISTANCE, VENDOR_ID, YEAR,
};
use crate::error::Result;

/// Whole seconds are floored in integer arithmetic before `unixepoch`.
const YEAR_EXPR: &str = "CAST(strftime('%Y', \
     (pickup_at - ((pickup_at % 1000000) + 1000000) % 1000000) / 1000000, 'unixepoch') AS INTEGER)";

/// `floor(trip_distance)` without the optional math extension.
const FLOOR_DISTANCE: &str =
    "CAST(trip_distance AS INTEGER) - (trip_distance < CAST(trip_distance AS INTEGER))";

pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        let df = read_trips(paths)?;
        Self::from_frame(&df)
    }

    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let trips = trips_from_frame(df)?;
        Self::from_trips(&trips)
    }

    pub fn from_trips(trips: &[Trip]) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "PRAGMA journal_mode = OFF;
             PRAGMA synchronous = OFF;
             PRAGMA temp_store = MEMORY;
             CREATE TABLE trips (
                 vendor_id       TEXT,
                 passenger_count INTEGER,
                 total_amount    REAL,
                 pickup_at       INTEGER,
                 trip_distance   REAL
             );",
        )?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO trips (vendor_id, passenger_count, total_amount, pickup_at, trip_distance)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for trip in trips {
                stmt.execute(params![
                    trip.vendor_id,
                    trip.passenger_count,
                    trip.total_amount,
                    trip.pickup_at,
                    trip.trip_distance
                ])?;
            }
        }
        tx.commit()?;

        debug!(rows = trips.len(), "sqlite table loaded");
        Ok(Self { conn })
    }
}

impl TableBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn query1(&self) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT vendor_id, COUNT(*) AS counts
             FROM trips
             WHERE vendor_id IS NOT NULL
             GROUP BY vendor_id
             ORDER BY vendor_id",
        )?;

        let mut vendors: Vec<Option<String>> = Vec::new();
        let mut counts: Vec<i64> = Vec::new();
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        for row in rows {
            let (vendor, count) = row?;
            vendors.push(vendor);
            counts.push(count);
        }

        Ok(DataFrame::new(vec![
            Series::new(VENDOR_ID.into(), vendors).into(),
            Series::new(COUNTS.into(), counts).into(),
        ])?)
    }

    fn query2(&self) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT passenger_count, AVG(total_amount) AS total_amount
             FROM trips
             WHERE passenger_count IS NOT NULL
             GROUP BY passenger_count
             ORDER BY passenger_count",
        )?;

        let mut keys: Vec<Option<i64>> = Vec::new();
        let mut means: Vec<Option<f64>> = Vec::new();
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        for row in rows {
            let (key, mean) = row?;
            keys.push(key);
            means.push(mean);
        }

        Ok(DataFrame::new(vec![
            Series::new(PASSENGER_COUNT.into(), keys).into(),
            Series::new(TOTAL_AMOUNT.into(), means).into(),
        ])?)
    }

    fn query3(&self) -> Result<DataFrame> {
        let sql = format!(
            "SELECT passenger_count, year, COUNT(*) AS counts
             FROM (SELECT passenger_count, {YEAR_EXPR} AS year FROM trips)
             WHERE passenger_count IS NOT NULL AND year IS NOT NULL
             GROUP BY passenger_count, year
             ORDER BY passenger_count, year"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;

        let mut keys: Vec<Option<i64>> = Vec::new();
        let mut years: Vec<Option<i64>> = Vec::new();
        let mut counts: Vec<i64> = Vec::new();
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        for row in rows {
            let (key, year, count) = row?;
            keys.push(key);
            years.push(year);
            counts.push(count);
        }

        Ok(DataFrame::new(vec![
            Series::new(PASSENGER_COUNT.into(), keys).into(),
            Series::new(YEAR.into(), years).into(),
            Series::new(COUNTS.into(), counts).into(),
        ])?)
    }

    fn query4(&self) -> Result<DataFrame> {
        let sql = format!(
            "SELECT passenger_count, year, trip_distance, COUNT(*) AS counts
             FROM (
                 SELECT passenger_count,
                        year,
                        CASE
                            WHEN distance - whole > 0.5 THEN whole + 1
                            WHEN distance - whole < 0.5 THEN whole
                            WHEN whole % 2 = 0 THEN whole
                            ELSE whole + 1
                        END AS trip_distance
                 FROM (
                     SELECT passenger_count,
                            {YEAR_EXPR} AS year,
                            trip_distance AS distance,
                            {FLOOR_DISTANCE} AS whole
                     FROM trips
                 )
             )
             WHERE passenger_count IS NOT NULL AND year IS NOT NULL AND trip_distance IS NOT NULL
             GROUP BY passenger_count, year, trip_distance
             ORDER BY year ASC, counts DESC, passenger_count ASC, trip_distance ASC"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;

        let mut keys: Vec<Option<i64>> = Vec::new();
        let mut years: Vec<Option<i64>> = Vec::new();
        let mut distances: Vec<Option<i64>> = Vec::new();
        let mut counts: Vec<i64> = Vec::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;
        for row in rows {
            let (key, year, distance, count) = row?;
            keys.push(key);
            years.push(year);
            distances.push(distance);
            counts.push(count);
        }

        Ok(DataFrame::new(vec![
            Series::new(PASSENGER_COUNT.into(), keys).into(),
            Series::new(YEAR.into(), years).into(),
            Series::new(TRIP_DISTANCE.into(), distances).into(),
            Series::new(COUNTS.into(), counts).into(),
        ])?)
    }
}
