//! Error types for ingestion.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading and ingesting diagnostic files.
///
/// Scoring and range queries never fail: missing data resolves to
/// sentinel values instead. Only the ingestion path reports errors.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Reading a file or directory failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A keyhole_stats line was not valid JSON.
    #[error("Failed to parse {path} line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// No `metrics.*` or `keyhole_stats.*` files were found.
    #[error("No diagnostic files found")]
    NoFiles,

    /// A file was readable but held no status documents.
    #[error("No status documents in {0}")]
    NoDocuments(PathBuf),

    /// The FTDC decoder rejected the file.
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// No FTDC decoder is linked into this build.
    #[error("No FTDC decoder available for {0}")]
    DecoderUnavailable(PathBuf),

    /// The worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Every discovered file failed to load.
    #[error("All {failed} diagnostic files failed to load (first error: {first})")]
    AllFailed { failed: usize, first: String },
}

/// Errors returned by window-bound computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    /// The requested window is longer than an assessment supports.
    #[error("Assessment is available when date range is less than a day")]
    WindowTooWide,
}

impl IngestError {
    /// Construct an I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }
}
