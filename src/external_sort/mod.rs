pub mod config;
pub mod constants;
pub mod error;
pub mod record;
pub mod cursor;
pub mod chunk;
pub mod merger;
pub mod pool;
pub mod scheduler;
pub mod processor;


pub use config::{RunConfig, SortParameters, SortSettings};
pub use error::{Result, SortError};
pub use processor::ExternalSortProcessor;
pub use record::{Record, RECORD_WIDTH};

use crate::external_sort::constants::{CHUNK_FILE_EXTENSION, CHUNK_FILE_PREFIX};

/// Chunk ids double as task ids: each task produces exactly one chunk.
pub type ChunkId = usize;

pub fn chunk_file_name(id: ChunkId) -> String {
    format!("{}{}{}", CHUNK_FILE_PREFIX, id, CHUNK_FILE_EXTENSION)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortStats {
    pub input_bytes: u64,
    pub records_sorted: u64,
    pub initial_chunks: usize,
    pub merge_waves: usize,
    pub merge_tasks: usize,
    pub split_time_ms: u64,
    pub sort_merge_time_ms: u64,
    pub total_time_ms: u64,
}

/// Runs a whole sort on the calling thread.
pub fn sort(config: RunConfig) -> Result<SortStats> {
    ExternalSortProcessor::new(config).process()
}

/// Runs a whole sort without blocking the async runtime.
pub async fn sort_file(config: RunConfig) -> Result<SortStats> {
    tokio::task::spawn_blocking(move || sort(config))
        .await
        .map_err(|e| SortError::TaskPanicked(e.to_string()))?
}
