// External Sort module - the main implementation
pub mod external_sort;

// Constants shared by the binary and the library
pub mod constants;

// Logging setup and formatting helpers
pub mod utils;

// Re-export main types for convenience
pub use external_sort::{
    sort, sort_file, ExternalSortProcessor, RunConfig, SortError, SortParameters, SortSettings,
    SortStats,
};
