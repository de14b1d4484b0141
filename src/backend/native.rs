use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Datelike, Utc};
use polars::prelude::*;
use tracing::debug;

use super::{
    read_trips, trips_from_frame, BackendKind, TableBackend, Trip, COUNTS, PASSENGER_COUNT,
    TOTAL_AMOUNT, TRIP_DISTANCE, VENDOR_ID, YEAR,
};
use crate::error::Result;

/// Baseline engine: decoded rows aggregated with ordered maps.
pub struct NativeBackend {
    trips: Vec<Trip>,
}

fn year_of(micros: Option<i64>) -> Option<i64> {
    micros
        .and_then(DateTime::<Utc>::from_timestamp_micros)
        .map(|ts| ts.year() as i64)
}

fn rounded(distance: Option<f64>) -> Option<i64> {
    distance
        .filter(|d| d.is_finite())
        .map(|d| d.round_ties_even() as i64)
}

impl NativeBackend {
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        let df = read_trips(paths)?;
        let trips = trips_from_frame(&df)?;
        debug!(rows = trips.len(), "native rows decoded");
        Ok(Self { trips })
    }

    pub fn from_trips(trips: Vec<Trip>) -> Self {
        Self { trips }
    }
}

impl TableBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn query1(&self) -> Result<DataFrame> {
        let mut groups: BTreeMap<&str, i64> = BTreeMap::new();
        for vendor in self.trips.iter().filter_map(|t| t.vendor_id.as_deref()) {
            *groups.entry(vendor).or_default() += 1;
        }

        let (vendors, counts): (Vec<&str>, Vec<i64>) = groups.into_iter().unzip();
        Ok(DataFrame::new(vec![
            Series::new(VENDOR_ID.into(), vendors).into(),
            Series::new(COUNTS.into(), counts).into(),
        ])?)
    }

    fn query2(&self) -> Result<DataFrame> {
        // (sum, non-null amounts)
        let mut groups: BTreeMap<i64, (f64, u64)> = BTreeMap::new();
        for trip in &self.trips {
            let Some(key) = trip.passenger_count else {
                continue;
            };
            let entry = groups.entry(key).or_default();
            if let Some(amount) = trip.total_amount {
                entry.0 += amount;
                entry.1 += 1;
            }
        }

        let mut keys = Vec::with_capacity(groups.len());
        let mut means = Vec::with_capacity(groups.len());
        for (key, (sum, n)) in groups {
            keys.push(key);
            means.push((n > 0).then(|| sum / n as f64));
        }

        Ok(DataFrame::new(vec![
            Series::new(PASSENGER_COUNT.into(), keys).into(),
            Series::new(TOTAL_AMOUNT.into(), means).into(),
        ])?)
    }

    fn query3(&self) -> Result<DataFrame> {
        let mut groups: BTreeMap<(i64, i64), i64> = BTreeMap::new();
        for trip in &self.trips {
            if let (Some(key), Some(year)) = (trip.passenger_count, year_of(trip.pickup_at)) {
                *groups.entry((key, year)).or_default() += 1;
            }
        }

        let mut keys = Vec::with_capacity(groups.len());
        let mut years = Vec::with_capacity(groups.len());
        let mut counts = Vec::with_capacity(groups.len());
        for ((key, year), count) in groups {
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
        type Key = (i64, i64, i64);

        let mut groups: BTreeMap<Key, i64> = BTreeMap::new();
        for trip in &self.trips {
            if let (Some(key), Some(year), Some(distance)) = (
                trip.passenger_count,
                year_of(trip.pickup_at),
                rounded(trip.trip_distance),
            ) {
                *groups.entry((key, year, distance)).or_default() += 1;
            }
        }

        // map order already breaks ties by (passenger_count, distance) within a year
        let mut rows: Vec<(Key, i64)> = groups.into_iter().collect();
        rows.sort_by(|(a, a_count), (b, b_count)| a.1.cmp(&b.1).then(b_count.cmp(a_count)));

        let mut keys = Vec::with_capacity(rows.len());
        let mut years = Vec::with_capacity(rows.len());
        let mut distances = Vec::with_capacity(rows.len());
        let mut counts = Vec::with_capacity(rows.len());
        for ((key, year, distance), count) in rows {
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
