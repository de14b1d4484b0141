use std::path::PathBuf;

use crate::bench::BackendSelection;
use crate::dataset::SIZE_FRACTIONS;

pub const DEFAULT_DATA_DIR: &str = "table/tmp";
pub const DEFAULT_OUTPUT: &str = "table/report/results.json";
pub const DEFAULT_REPEAT: usize = 10;

/// Everything a benchmark run needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub backends: BackendSelection,
    pub data_dir: PathBuf,
    pub output: PathBuf,
    pub repeat: usize,
    pub fractions: Vec<f64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            backends: BackendSelection::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            output: PathBuf::from(DEFAULT_OUTPUT),
            repeat: DEFAULT_REPEAT,
            fractions: SIZE_FRACTIONS.to_vec(),
        }
    }
}
