use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Target sizes, as fractions of the whole dataset's bytes.
pub const SIZE_FRACTIONS: [f64; 8] = [0.01, 0.02, 0.04, 0.08, 0.16, 0.32, 0.64, 1.0];

/// One parquet file of the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// A prefix of the dataset files used for every backend at one size fraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPart {
    pub paths: Vec<PathBuf>,
    pub bytes: u64,
    pub label: String,
}

/// Find every `*.parquet` file below `dir`, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<DatasetFile>> {
    let pattern = dir.join("**").join("*.parquet");
    let mut files = Vec::new();

    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = entry?;
        let bytes = std::fs::metadata(&path)?.len();
        files.push(DatasetFile { path, bytes });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(dir = %dir.display(), files = files.len(), "discovered dataset files");
    Ok(files)
}

pub fn total_bytes(files: &[DatasetFile]) -> u64 {
    files.iter().map(|f| f.bytes).sum()
}

/// Greedy prefix selection: the shortest run of files, in the given order,
/// whose cumulative size reaches `fraction` of the total. It may overshoot.
pub fn prefix_for_fraction(files: &[DatasetFile], fraction: f64) -> DatasetPart {
    let total = total_bytes(files);
    let mut paths = Vec::new();
    let mut bytes = 0u64;

    for file in files {
        paths.push(file.path.clone());
        bytes += file.bytes;
        if total == 0 || bytes as f64 / total as f64 >= fraction {
            break;
        }
    }

    debug!(fraction, files = paths.len(), bytes, "selected dataset prefix");
    DatasetPart {
        paths,
        bytes,
        label: natural_size(bytes),
    }
}

/// Decimal, one-decimal human readable size ("1 Byte", "42 Bytes", "1.5 kB").
pub fn natural_size(bytes: u64) -> String {
    const BASE: f64 = 1000.0;
    const SUFFIXES: [&str; 8] = ["kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

    if bytes == 1 {
        return "1 Byte".to_string();
    }
    if (bytes as f64) < BASE {
        return format!("{} Bytes", bytes);
    }

    let value = bytes as f64;
    for (i, suffix) in SUFFIXES.iter().enumerate() {
        let unit = BASE.powi(i as i32 + 2);
        if value < unit {
            return format!("{:.1} {}", BASE * value / unit, suffix);
        }
    }
    format!("{:.1} YB", value / BASE.powi(SUFFIXES.len() as i32))
}
