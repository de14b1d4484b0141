//! Benchmark enumeration.
//!
//! A benchmark group is one backend over one dataset slice: a Parse
//! descriptor that builds the backend instance and four Query descriptors
//! that run against it. The group shares a [`BenchContext`] owning that
//! instance; nothing is global.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{self, BackendKind, TableBackend};
use crate::dataset::{self, DatasetFile, DatasetPart};
use crate::error::{BenchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Parse,
    Query1,
    Query2,
    Query3,
    Query4,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Parse,
        Operation::Query1,
        Operation::Query2,
        Operation::Query3,
        Operation::Query4,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Parse => "Parse",
            Operation::Query1 => "Query 1",
            Operation::Query2 => "Query 2",
            Operation::Query3 => "Query 3",
            Operation::Query4 => "Query 4",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validated set of backends to benchmark, always in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSelection {
    backends: Vec<BackendKind>,
}

impl Default for BackendSelection {
    fn default() -> Self {
        Self {
            backends: BackendKind::DEFAULT.to_vec(),
        }
    }
}

impl BackendSelection {
    /// Parse a comma-separated list such as `"SQLite, polars"`.
    pub fn parse(input: &str) -> Result<Self> {
        let names: Vec<&str> = input.split(',').collect();
        Self::from_names(&names)
    }

    /// Names are matched case-insensitively; blanks are skipped and an
    /// all-blank list selects the defaults. Unknown names are rejected.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut requested = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            requested.push(name.parse::<BackendKind>()?);
        }

        if requested.is_empty() {
            return Ok(Self::default());
        }

        let backends = BackendKind::ALL
            .iter()
            .copied()
            .filter(|kind| requested.contains(kind))
            .collect();
        Ok(Self { backends })
    }

    pub fn backends(&self) -> &[BackendKind] {
        &self.backends
    }
}

/// State shared by the five descriptors of one benchmark group.
pub struct BenchContext {
    backend: BackendKind,
    paths: Vec<PathBuf>,
    instance: Mutex<Option<Box<dyn TableBackend>>>,
}

impl BenchContext {
    pub fn new(backend: BackendKind, paths: Vec<PathBuf>) -> Self {
        Self {
            backend,
            paths,
            instance: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Box<dyn TableBackend>>> {
        self.instance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build a fresh instance from the group's files, replacing any earlier one.
    pub fn parse(&self) -> Result<()> {
        let instance = backend::construct(self.backend, &self.paths)?;
        *self.slot() = Some(instance);
        Ok(())
    }

    pub fn query(&self, operation: Operation) -> Result<DataFrame> {
        let slot = self.slot();
        let instance = match slot.as_ref() {
            Some(instance) if instance.kind() == self.backend => instance,
            _ => return Err(BenchError::UninitializedInstance(self.backend.to_string())),
        };

        match operation {
            Operation::Query1 => instance.query1(),
            Operation::Query2 => instance.query2(),
            Operation::Query3 => instance.query3(),
            Operation::Query4 => instance.query4(),
            Operation::Parse => Err(BenchError::UninitializedInstance(self.backend.to_string())),
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.slot().is_some()
    }

    /// Drop the parsed instance once the group is done.
    pub fn reset(&self) {
        if self.slot().take().is_some() {
            debug!(backend = %self.backend, "benchmark group reset");
        }
    }
}

type BenchFn = Box<dyn Fn() -> Result<Option<DataFrame>> + Send + Sync>;

/// One timed unit of work.
pub struct Bench {
    pub operation: Operation,
    pub backend: BackendKind,
    pub dataset: String,
    pub dataset_bytes: u64,
    context: Arc<BenchContext>,
    func: BenchFn,
}

impl Bench {
    /// Parse yields no table; queries return their result.
    pub fn run(&self) -> Result<Option<DataFrame>> {
        (self.func)()
    }

    pub fn context(&self) -> &Arc<BenchContext> {
        &self.context
    }

    pub fn same_group(&self, other: &Bench) -> bool {
        Arc::ptr_eq(&self.context, &other.context)
    }
}

impl fmt::Debug for Bench {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bench")
            .field("operation", &self.operation)
            .field("backend", &self.backend)
            .field("dataset", &self.dataset)
            .field("dataset_bytes", &self.dataset_bytes)
            .finish()
    }
}

/// The five descriptors of one group, in operation order.
pub fn benchmarks_for_backend(backend: BackendKind, part: &DatasetPart) -> Vec<Bench> {
    let context = Arc::new(BenchContext::new(backend, part.paths.clone()));

    Operation::ALL
        .iter()
        .map(|&operation| {
            let ctx = Arc::clone(&context);
            let func: BenchFn = match operation {
                Operation::Parse => Box::new(move || ctx.parse().map(|_| None)),
                query => Box::new(move || ctx.query(query).map(Some)),
            };

            Bench {
                operation,
                backend,
                dataset: part.label.clone(),
                dataset_bytes: part.bytes,
                context: Arc::clone(&context),
                func,
            }
        })
        .collect()
}

pub fn benchmarks_for_backends<'a>(
    backends: &'a [BackendKind],
    part: DatasetPart,
) -> impl Iterator<Item = Bench> + 'a {
    backends
        .iter()
        .flat_map(move |&backend| benchmarks_for_backend(backend, &part))
}

/// Every fraction × backend × operation, fractions outermost.
pub fn available_benchmarks<'a>(
    selection: &'a BackendSelection,
    files: &'a [DatasetFile],
    fractions: &'a [f64],
) -> impl Iterator<Item = Bench> + 'a {
    fractions.iter().flat_map(move |&fraction| {
        let part = dataset::prefix_for_fraction(files, fraction);
        benchmarks_for_backends(selection.backends(), part)
    })
}
