use std::path::PathBuf;

use polars::prelude::*;
use tracing::debug;

use super::{normalize, query1_plan, query2_plan, query3_plan, query4_plan, BackendKind, TableBackend};
use crate::error::{BenchError, Result};

/// Trips kept as a lazy parquet scan; nothing is read until a query runs.
pub struct PolarsLazyBackend {
    lf: LazyFrame,
}

impl PolarsLazyBackend {
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        let scans = paths
            .iter()
            .map(|path| -> Result<LazyFrame> {
                let scan = LazyFrame::scan_parquet(path, ScanArgsParquet::default())?;
                normalize(scan)
            })
            .collect::<Result<Vec<_>>>()?;

        let lf = match scans.len() {
            0 => return Err(BenchError::EmptyInput),
            1 => scans.into_iter().next().ok_or(BenchError::EmptyInput)?,
            _ => concat(scans, UnionArgs::default())?,
        };

        debug!(files = paths.len(), "polars scan planned");
        Ok(Self { lf })
    }

    pub fn from_lazy(lf: LazyFrame) -> Self {
        Self { lf }
    }
}

impl TableBackend for PolarsLazyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PolarsLazy
    }

    fn query1(&self) -> Result<DataFrame> {
        Ok(query1_plan(self.lf.clone()).collect()?)
    }

    fn query2(&self) -> Result<DataFrame> {
        Ok(query2_plan(self.lf.clone()).collect()?)
    }

    fn query3(&self) -> Result<DataFrame> {
        Ok(query3_plan(self.lf.clone()).collect()?)
    }

    fn query4(&self) -> Result<DataFrame> {
        Ok(query4_plan(self.lf.clone()).collect()?)
    }
}
