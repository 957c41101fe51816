pub const BYTES_PER_KB: usize = 1024;
pub const BYTES_PER_MB: usize = 1_048_576;
pub const BYTES_PER_GB: f64 = 1_073_741_824.0;

pub const VERBOSITY_SILENT: &str = "silent";
pub const VERBOSITY_NORMAL: &str = "normal";
pub const VERBOSITY_VERBOSE: &str = "verbose";

pub const USAGE_ARGUMENTS: &str =
    "input_file output_file [memory_limit_mb [threads_count [ways_for_merging]]]";
