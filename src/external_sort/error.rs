use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::external_sort::ChunkId;

pub type Result<T> = std::result::Result<T, SortError>;

/// Every way a sort run can fail. None of them are recoverable: the first
/// error reaching the driver aborts the run.
#[derive(Error, Debug)]
pub enum SortError {
    #[error("{reason}")]
    Configuration { reason: String },

    #[error("cannot {operation} {}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("chunk {} holds more than {capacity} bytes", path.display())]
    ChunkOverflow { path: PathBuf, capacity: usize },

    #[error("merge into chunk {chunk} failed its dependency check: {reason}")]
    MergeDependency { chunk: ChunkId, reason: String },

    #[error("worker task panicked: {0}")]
    TaskPanicked(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

impl SortError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration { reason: reason.into() }
    }

    pub fn dependency(chunk: ChunkId, reason: impl Into<String>) -> Self {
        Self::MergeDependency { chunk, reason: reason.into() }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Attaches the failed operation and the file it touched to a raw I/O error.
pub trait IoResultExt<T> {
    fn with_path(self, operation: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path(self, operation: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| SortError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        })
    }
}
