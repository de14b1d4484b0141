use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bench::{Bench, BenchContext};
use crate::error::Result;

/// Timing statistics of one benchmark descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchRecord {
    pub operation: String,
    pub backend: String,
    pub dataset: String,
    pub dataset_bytes: u64,
    pub iterations: usize,
    pub seconds_mean: f64,
    pub seconds_stddev: f64,
    pub seconds_min: f64,
    pub seconds_max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BenchRecord {
    fn new(bench: &Bench, samples: &[f64], error: Option<String>) -> Self {
        let n = samples.len();
        let (mean, min, max) = if n > 0 {
            (
                samples.iter().sum::<f64>() / n as f64,
                samples.iter().copied().fold(f64::INFINITY, f64::min),
                samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        } else {
            (0.0, 0.0, 0.0)
        };
        let variance = if n > 1 {
            samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };

        Self {
            operation: bench.operation.to_string(),
            backend: bench.backend.to_string(),
            dataset: bench.dataset.clone(),
            dataset_bytes: bench.dataset_bytes,
            iterations: n,
            seconds_mean: mean,
            seconds_stddev: variance.sqrt(),
            seconds_min: min,
            seconds_max: max,
            error,
        }
    }

    fn same_key(&self, other: &BenchRecord) -> bool {
        self.operation == other.operation
            && self.backend == other.backend
            && self.dataset_bytes == other.dataset_bytes
            && self.dataset == other.dataset
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchReport {
    pub results: Vec<BenchRecord>,
}

impl BenchReport {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Insert `record`, replacing an earlier one for the same
    /// operation, backend and dataset slice (bytes and label).
    pub fn upsert(&mut self, record: BenchRecord) {
        match self.results.iter_mut().find(|r| r.same_key(&record)) {
            Some(existing) => *existing = record,
            None => self.results.push(record),
        }
    }
}

/// Run one descriptor `repeat` times; the first failure ends the repetitions.
pub fn measure(bench: &Bench, repeat: usize) -> BenchRecord {
    let mut samples = Vec::with_capacity(repeat);

    for _ in 0..repeat {
        let start = Instant::now();
        match bench.run() {
            Ok(_) => samples.push(start.elapsed().as_secs_f64()),
            Err(e) => {
                warn!(
                    backend = %bench.backend,
                    operation = %bench.operation,
                    dataset = %bench.dataset,
                    error = %e,
                    "benchmark failed"
                );
                return BenchRecord::new(bench, &samples, Some(e.to_string()));
            }
        }
    }

    BenchRecord::new(bench, &samples, None)
}

/// Execute every descriptor in order, persisting the report to `path`
/// after each one. Records already in the file for other descriptors are kept.
pub fn run_persisted_benchmarks(
    benches: impl IntoIterator<Item = Bench>,
    repeat: usize,
    path: &Path,
) -> Result<BenchReport> {
    let mut report = BenchReport::load(path)?;
    let mut current: Option<Arc<BenchContext>> = None;

    for bench in benches {
        if let Some(previous) = current.as_ref() {
            if !Arc::ptr_eq(previous, bench.context()) {
                previous.reset();
            }
        }
        current = Some(Arc::clone(bench.context()));

        info!(
            backend = %bench.backend,
            operation = %bench.operation,
            dataset = %bench.dataset,
            repeat,
            "running benchmark"
        );
        let record = measure(&bench, repeat);
        if record.error.is_none() {
            info!(
                backend = %bench.backend,
                operation = %bench.operation,
                mean = record.seconds_mean,
                "benchmark finished"
            );
        }

        report.upsert(record);
        report.save(path)?;
    }

    if let Some(last) = current {
        last.reset();
    }

    Ok(report)
}

/// One table per dataset slice; the fastest mean per operation is starred.
pub fn print_summary(report: &BenchReport) {
    let mut datasets: Vec<(u64, &str)> = report
        .results
        .iter()
        .map(|r| (r.dataset_bytes, r.dataset.as_str()))
        .collect();
    datasets.sort();
    datasets.dedup();

    for (bytes, dataset) in datasets {
        let rows: Vec<&BenchRecord> = report
            .results
            .iter()
            .filter(|r| r.dataset_bytes == bytes && r.dataset == dataset)
            .collect();

        println!("\n{}", format!("━━━ {} ({} bytes) ━━━", dataset, bytes).bold().cyan());
        println!("{}", summary_table(&rows));
    }
}

fn summary_table(rows: &[&BenchRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["Backend", "Operation", "Mean (s)", "Stddev (s)", "Min (s)", "Max (s)", "Runs"]);

    for r in rows {
        if let Some(err) = &r.error {
            table.add_row(vec![
                Cell::new(&r.backend).fg(Color::Red),
                Cell::new(&r.operation),
                Cell::new(format!("ERR({})", err)).fg(Color::Red),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(r.iterations),
            ]);
            continue;
        }

        let best = rows
            .iter()
            .filter(|o| o.operation == r.operation && o.error.is_none())
            .map(|o| o.seconds_mean)
            .fold(f64::INFINITY, f64::min);
        let mut name = Cell::new(&r.backend);
        let mut mean = Cell::new(format!("{:.6}", r.seconds_mean));
        if r.seconds_mean <= best {
            name = Cell::new(format!("★ {}", r.backend)).fg(Color::Green);
            mean = mean.fg(Color::Green);
        }

        table.add_row(vec![
            name,
            Cell::new(&r.operation),
            mean,
            Cell::new(format!("{:.6}", r.seconds_stddev)),
            Cell::new(format!("{:.6}", r.seconds_min)),
            Cell::new(format!("{:.6}", r.seconds_max)),
            Cell::new(r.iterations),
        ]);
    }

    table
}
