use std::path::PathBuf;

use polars::prelude::*;
use tracing::debug;

use super::{query1_plan, query2_plan, query3_plan, query4_plan, read_trips, BackendKind, TableBackend};
use crate::error::Result;

/// Trips materialized in memory as one polars `DataFrame`.
pub struct PolarsBackend {
    df: DataFrame,
}

impl PolarsBackend {
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        let df = read_trips(paths)?;
        debug!(rows = df.height(), files = paths.len(), "polars frame loaded");
        Ok(Self { df })
    }

    /// Wrap an already cleaned frame.
    pub fn from_frame(df: DataFrame) -> Self {
        Self { df }
    }
}

impl TableBackend for PolarsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Polars
    }

    fn query1(&self) -> Result<DataFrame> {
        Ok(query1_plan(self.df.clone().lazy()).collect()?)
    }

    fn query2(&self) -> Result<DataFrame> {
        Ok(query2_plan(self.df.clone().lazy()).collect()?)
    }

    fn query3(&self) -> Result<DataFrame> {
        Ok(query3_plan(self.df.clone().lazy()).collect()?)
    }

    fn query4(&self) -> Result<DataFrame> {
        Ok(query4_plan(self.df.clone().lazy()).collect()?)
    }
}
