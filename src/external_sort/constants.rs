pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 10;
pub const MIN_MEMORY_LIMIT_MB: u64 = 1;
pub const MAX_MEMORY_LIMIT_MB: u64 = 256;

pub const DEFAULT_THREADS_COUNT: usize = 4;
pub const MIN_THREADS_COUNT: usize = 1;
pub const MAX_THREADS_COUNT: usize = 100;

pub const DEFAULT_WAYS_FOR_MERGING: usize = 2;
pub const MIN_WAYS_FOR_MERGING: usize = 2;

// Each worker must be able to hold at least this many records
pub const MIN_RECORDS_PER_CHUNK: usize = 2;

pub const DEFAULT_IO_BUFFER_SIZE_KB: usize = 64;
pub const MIN_IO_BUFFER_SIZE_KB: usize = 1;
pub const MAX_IO_BUFFER_SIZE_KB: usize = 16 * 1024;

pub const CHUNK_FILE_PREFIX: &str = "chunk";
pub const CHUNK_FILE_EXTENSION: &str = ".bin";

pub const WORKER_THREAD_PREFIX: &str = "sort-worker";
