pub mod backend;
pub mod bench;
pub mod config;
pub mod dataset;
pub mod error;
pub mod runner;

pub use backend::{construct, BackendKind, TableBackend};
pub use bench::{available_benchmarks, BackendSelection, Bench, Operation};
pub use config::RunConfig;
pub use error::{BenchError, Result};
pub use runner::{print_summary, run_persisted_benchmarks, BenchReport};
