use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::constants::{BYTES_PER_KB, BYTES_PER_MB};
use crate::external_sort::constants::*;
use crate::external_sort::error::{IoResultExt, Result, SortError};
use crate::external_sort::record::RECORD_WIDTH;
use crate::external_sort::{chunk_file_name, ChunkId};

/// Raw, possibly incomplete run parameters as they arrive from the command
/// line and the optional settings file. Nothing here has been validated.
#[derive(Debug, Clone, Default)]
pub struct SortParameters {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub memory_limit_mb: Option<u64>,
    pub threads: Option<usize>,
    pub ways: Option<usize>,
    pub work_directory: Option<PathBuf>,
    pub io_buffer_size_kb: Option<usize>,
}

impl SortParameters {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: Some(input.into()),
            output: Some(output.into()),
            ..Default::default()
        }
    }

    /// Seeds parameters from a settings file; explicit arguments are applied on top.
    pub fn from_settings(settings: &SortSettings) -> Self {
        Self {
            input: None,
            output: None,
            memory_limit_mb: settings.memory_limit_mb,
            threads: settings.threads,
            ways: settings.ways,
            work_directory: settings.work_directory.clone(),
            io_buffer_size_kb: settings.io_buffer_size_kb,
        }
    }

    /// Validates everything and derives the immutable run configuration.
    pub fn resolve(&self) -> Result<RunConfig> {
        let input = self
            .input
            .clone()
            .ok_or_else(|| SortError::configuration("Input filename not specified"))?;
        let output = self
            .output
            .clone()
            .ok_or_else(|| SortError::configuration("Output filename not specified"))?;

        let memory_limit_mb = self.memory_limit_mb.unwrap_or(DEFAULT_MEMORY_LIMIT_MB);
        if !(MIN_MEMORY_LIMIT_MB..=MAX_MEMORY_LIMIT_MB).contains(&memory_limit_mb) {
            return Err(SortError::configuration(format!(
                "Incorrect memory limit: {} MB (must be between {} and {} MB)",
                memory_limit_mb, MIN_MEMORY_LIMIT_MB, MAX_MEMORY_LIMIT_MB
            )));
        }
        let memory_budget = memory_limit_mb as usize * BYTES_PER_MB;

        let mut config = RunConfig::new(
            input,
            output,
            memory_budget,
            self.threads.unwrap_or(DEFAULT_THREADS_COUNT),
            self.ways.unwrap_or(DEFAULT_WAYS_FOR_MERGING),
        )?;

        if let Some(dir) = &self.work_directory {
            config = config.with_work_directory(dir.clone());
        }
        if let Some(kb) = self.io_buffer_size_kb {
            validate_io_buffer_kb(kb)?;
            config = config.with_io_buffer_size(kb * BYTES_PER_KB);
        }

        Ok(config)
    }
}

/// Parses an optional numeric argument, reporting `reason` when it is not a number.
pub fn parse_optional<T: FromStr>(raw: Option<&str>, reason: &str) -> Result<Option<T>> {
    match raw {
        None => Ok(None),
        Some(text) => text
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SortError::configuration(format!("{}: '{}' is not a number", reason, text))),
    }
}

/// Validated configuration for one run. Built once, never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub threads: usize,
    pub memory_budget: usize,
    pub ways: usize,
    pub chunk_size: usize,
    pub work_directory: PathBuf,
    pub io_buffer_size: usize,
}

impl RunConfig {
    /// Builds a configuration from a budget already expressed in bytes.
    ///
    /// The megabyte range check lives in [`SortParameters::resolve`]; every
    /// other rule is applied here so that small budgets stay consistent.
    pub fn new(
        input_path: PathBuf,
        output_path: PathBuf,
        memory_budget: usize,
        threads: usize,
        ways: usize,
    ) -> Result<Self> {
        if !(MIN_THREADS_COUNT..=MAX_THREADS_COUNT).contains(&threads) {
            return Err(SortError::configuration(format!(
                "Incorrect threads count: {} (must be between {} and {})",
                threads, MIN_THREADS_COUNT, MAX_THREADS_COUNT
            )));
        }

        // Heap bookkeeping during a merge needs at least one record per way.
        if ways < MIN_WAYS_FOR_MERGING || ways.saturating_mul(RECORD_WIDTH) > memory_budget {
            return Err(SortError::configuration(format!(
                "Can not use {} ways for merging with a {} byte memory budget",
                ways, memory_budget
            )));
        }

        if memory_budget < MIN_RECORDS_PER_CHUNK * RECORD_WIDTH * threads {
            return Err(SortError::configuration(format!(
                "Insufficient memory for {} threads: each thread needs at least {} bytes",
                threads,
                MIN_RECORDS_PER_CHUNK * RECORD_WIDTH
            )));
        }

        let per_thread = memory_budget / threads;
        let chunk_size = per_thread - per_thread % RECORD_WIDTH;

        Ok(Self {
            input_path,
            output_path,
            threads,
            memory_budget,
            ways,
            chunk_size,
            work_directory: PathBuf::from("."),
            io_buffer_size: DEFAULT_IO_BUFFER_SIZE_KB * BYTES_PER_KB,
        })
    }

    pub fn with_work_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_directory = dir.into();
        self
    }

    pub fn with_io_buffer_size(mut self, bytes: usize) -> Self {
        self.io_buffer_size = bytes.max(RECORD_WIDTH);
        self
    }

    pub fn chunk_path(&self, id: ChunkId) -> PathBuf {
        self.work_directory.join(chunk_file_name(id))
    }

    pub fn records_per_chunk(&self) -> usize {
        self.chunk_size / RECORD_WIDTH
    }

    /// Buffer for each merge input and for the merge output. A merge keeps
    /// `ways` readers and one writer open, and together they fit in one
    /// worker's `chunk_size` unless that is below one record per buffer.
    pub fn merge_buffer_size(&self) -> usize {
        let share = self.chunk_size / (self.ways + 1);
        let share = share - share % RECORD_WIDTH;
        share.clamp(RECORD_WIDTH, self.io_buffer_size.max(RECORD_WIDTH))
    }

    /// Logs a warning when the budget exceeds what the machine has free.
    pub fn check_system_memory(&self) {
        use sysinfo::System;
        let mut system = System::new();
        system.refresh_memory();

        let available = system.available_memory() as usize;
        debug!(
            "System memory: {:.1} MB available, budget {:.1} MB",
            available as f64 / BYTES_PER_MB as f64,
            self.memory_budget as f64 / BYTES_PER_MB as f64
        );
        if available > 0 && self.memory_budget > available {
            warn!(
                "Memory budget of {:.1} MB exceeds the {:.1} MB currently available",
                self.memory_budget as f64 / BYTES_PER_MB as f64,
                available as f64 / BYTES_PER_MB as f64
            );
        }
    }
}

/// Optional JSON settings file. Every field may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSettings {
    pub memory_limit_mb: Option<u64>,
    pub threads: Option<usize>,
    pub ways: Option<usize>,
    pub work_directory: Option<PathBuf>,
    pub io_buffer_size_kb: Option<usize>,
    pub verbose: bool,
}

impl SortSettings {
    pub fn defaults() -> Self {
        Self {
            memory_limit_mb: Some(DEFAULT_MEMORY_LIMIT_MB),
            threads: Some(DEFAULT_THREADS_COUNT),
            ways: Some(DEFAULT_WAYS_FOR_MERGING),
            work_directory: None,
            io_buffer_size_kb: Some(DEFAULT_IO_BUFFER_SIZE_KB),
            verbose: false,
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_path("read settings file", path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(content)
            .map_err(|e| SortError::configuration(format!("Invalid settings file: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SortError::configuration(format!("Cannot encode settings: {}", e)))?;
        std::fs::write(path, content).with_path("write settings file", path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(mb) = self.memory_limit_mb {
            if !(MIN_MEMORY_LIMIT_MB..=MAX_MEMORY_LIMIT_MB).contains(&mb) {
                return Err(SortError::configuration(format!(
                    "Memory limit must be between {} and {} MB",
                    MIN_MEMORY_LIMIT_MB, MAX_MEMORY_LIMIT_MB
                )));
            }
        }

        if let Some(threads) = self.threads {
            if !(MIN_THREADS_COUNT..=MAX_THREADS_COUNT).contains(&threads) {
                return Err(SortError::configuration(format!(
                    "Threads count must be between {} and {}",
                    MIN_THREADS_COUNT, MAX_THREADS_COUNT
                )));
            }
        }

        if let Some(ways) = self.ways {
            if ways < MIN_WAYS_FOR_MERGING {
                return Err(SortError::configuration(format!(
                    "Ways for merging must be at least {}",
                    MIN_WAYS_FOR_MERGING
                )));
            }
        }

        if let Some(kb) = self.io_buffer_size_kb {
            validate_io_buffer_kb(kb)?;
        }

        Ok(())
    }
}

fn validate_io_buffer_kb(kb: usize) -> Result<()> {
    if !(MIN_IO_BUFFER_SIZE_KB..=MAX_IO_BUFFER_SIZE_KB).contains(&kb) {
        return Err(SortError::configuration(format!(
            "I/O buffer size must be between {} and {} KB",
            MIN_IO_BUFFER_SIZE_KB, MAX_IO_BUFFER_SIZE_KB
        )));
    }
    Ok(())
}
