use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Uninitialized instance for backend {0}")]
    UninitializedInstance(String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("No dataset files found under {0}")]
    NoDatasets(String),

    #[error("No input files given to construct the table")]
    EmptyInput,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Glob pattern error: {0}")]
    PatternError(#[from] glob::PatternError),

    #[error("Glob error: {0}")]
    GlobError(#[from] glob::GlobError),
}

pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    pub fn display_friendly(&self) -> String {
        match self {
            BenchError::UnknownBackend(name) => {
                format!(
                    "Unknown backend '{}'.\nUse one of: polars, polars-lazy, sqlite, native.",
                    name
                )
            }
            BenchError::NoDatasets(dir) => {
                format!(
                    "No parquet files found under '{}'.\nUse --data-dir to point at the taxi dataset.",
                    dir
                )
            }
            BenchError::UninitializedInstance(backend) => {
                format!(
                    "Backend {} was queried before its Parse benchmark ran.",
                    backend
                )
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_message_lists_known_backends() {
        let msg = BenchError::UnknownBackend("pandas".to_string()).display_friendly();
        assert!(msg.contains("'pandas'"));
        assert!(msg.contains("polars-lazy"));
    }

    #[test]
    fn io_errors_convert() {
        let err: BenchError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, BenchError::IoError(_)));
        assert_eq!(err.display_friendly(), "I/O error: gone");
    }
}
