use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use colored::*;
use table_bench::config::{DEFAULT_DATA_DIR, DEFAULT_OUTPUT, DEFAULT_REPEAT};
use table_bench::{
    available_benchmarks, construct, dataset, print_summary, run_persisted_benchmarks,
    BackendSelection, BenchError, RunConfig,
};

#[derive(Parser)]
#[command(name = "tbench")]
#[command(about = "Time table engines parsing taxi trips and running four grouped queries", long_about = None)]
#[command(version)]
struct Cli {
    /// Backends to benchmark, comma-separated (polars, polars-lazy, sqlite, native)
    #[arg(short, long, value_name = "LIST")]
    backends: Option<String>,

    /// Directory searched recursively for *.parquet files
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Results file (JSON)
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Timed repetitions per benchmark
    #[arg(short, long, default_value_t = DEFAULT_REPEAT)]
    repeat: usize,

    /// Only list the backends and dataset sizes
    #[arg(long)]
    list: bool,

    /// Print every query result on the full dataset instead of timing
    #[arg(long)]
    show: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn run_config(&self) -> table_bench::Result<RunConfig> {
        let backends = match &self.backends {
            Some(list) => BackendSelection::parse(list)?,
            None => BackendSelection::default(),
        };

        Ok(RunConfig {
            backends,
            data_dir: self.data_dir.clone(),
            output: self.output.clone(),
            repeat: self.repeat,
            ..RunConfig::default()
        })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    let config = match cli.run_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e.display_friendly());
            std::process::exit(2);
        }
    };

    let files = dataset::discover(&config.data_dir)
        .with_context(|| format!("scanning {}", config.data_dir.display()))?;
    if files.is_empty() {
        let err = BenchError::NoDatasets(config.data_dir.display().to_string());
        eprintln!("{}: {}", "Error".red().bold(), err.display_friendly());
        std::process::exit(1);
    }

    if cli.show {
        return show_queries(&config, &files);
    }

    let benches: Vec<_> =
        available_benchmarks(&config.backends, &files, &config.fractions).collect();
    let backends: BTreeSet<String> = benches.iter().map(|b| b.backend.to_string()).collect();
    let mut datasets: Vec<(u64, &str)> = benches
        .iter()
        .map(|b| (b.dataset_bytes, b.dataset.as_str()))
        .collect();
    datasets.sort();
    datasets.dedup();

    println!("{} {:?}", "Available backends:".bold(), backends);
    println!(
        "{} {:?}",
        "Available datasets:".bold(),
        datasets.iter().map(|(_, label)| *label).collect::<Vec<_>>()
    );

    if cli.list {
        return Ok(());
    }

    let report = run_persisted_benchmarks(benches, config.repeat, &config.output)
        .with_context(|| format!("writing results to {}", config.output.display()))?;
    print_summary(&report);

    if cli.verbose {
        println!(
            "\nResults written: {} record(s) in {}",
            report.results.len(),
            config.output.display()
        );
    }

    Ok(())
}

fn show_queries(config: &RunConfig, files: &[dataset::DatasetFile]) -> anyhow::Result<()> {
    let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();

    for &kind in config.backends.backends() {
        println!("\n{}", format!("▶ {}", kind).bold().green());
        let backend = construct(kind, &paths).with_context(|| format!("parsing with {}", kind))?;

        println!("Query 1:\n{}", backend.query1()?);
        println!("Query 2:\n{}", backend.query2()?);
        println!("Query 3:\n{}", backend.query3()?);
        println!("Query 4:\n{}", backend.query4()?);
    }

    Ok(())
}
