use std::fs::{self, File};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::external_sort::chunk::{ChunkReport, ChunkSorter, ChunkSplitter};
use crate::external_sort::config::RunConfig;
use crate::external_sort::error::{IoResultExt, Result, SortError};
use crate::external_sort::pool::{TaskPool, TaskRegistry};
use crate::external_sort::scheduler::{MergePlan, MergeScheduler};
use crate::external_sort::SortStats;

/// Drives one sort run: split, sort every chunk, merge in waves, rename.
pub struct ExternalSortProcessor {
    config: Arc<RunConfig>,
}

impl ExternalSortProcessor {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn process(&self) -> Result<SortStats> {
        let start_time = Instant::now();
        let config = &self.config;
        if let Ok(json) = serde_json::to_string(config.as_ref()) {
            debug!("Run configuration: {}", json);
        }
        config.check_system_memory();

        fs::create_dir_all(&config.work_directory)
            .with_path("create work directory", &config.work_directory)?;
        let input_bytes = fs::metadata(&config.input_path)
            .with_path("inspect input", &config.input_path)?
            .len();

        let split_start = Instant::now();
        let splitter = ChunkSplitter::new(config.chunk_size, config.work_directory.clone());
        let initial_chunks = splitter.split(&config.input_path)?;
        let split_time_ms = split_start.elapsed().as_millis() as u64;
        info!("Split into {} chunks.", initial_chunks);

        let plan = MergePlan::build(initial_chunks, config.ways);
        let mut stats = SortStats {
            input_bytes,
            initial_chunks,
            merge_waves: plan.waves.len(),
            merge_tasks: plan.task_count(),
            split_time_ms,
            ..Default::default()
        };

        let Some(final_chunk) = plan.final_chunk() else {
            File::create(&config.output_path).with_path("create output", &config.output_path)?;
            info!("Input is empty, wrote empty output");
            stats.total_time_ms = start_time.elapsed().as_millis() as u64;
            return Ok(stats);
        };

        let sort_merge_start = Instant::now();
        let report = self.run_tasks(&plan, final_chunk)?;
        stats.sort_merge_time_ms = sort_merge_start.elapsed().as_millis() as u64;
        stats.records_sorted = report.record_count;

        let final_path = config.chunk_path(final_chunk);
        fs::rename(&final_path, &config.output_path).with_path("rename final chunk", &final_path)?;
        info!(
            "Chunk #{} renamed to {}",
            final_chunk,
            config.output_path.display()
        );

        stats.total_time_ms = start_time.elapsed().as_millis() as u64;
        Ok(stats)
    }

    /// Submits one sort task per initial chunk and then the merge waves,
    /// blocking until the task producing `final_chunk` is done.
    fn run_tasks(&self, plan: &MergePlan, final_chunk: usize) -> Result<ChunkReport> {
        let pool = TaskPool::new(self.config.threads)?;
        let registry: Arc<TaskRegistry<ChunkReport>> = Arc::new(TaskRegistry::new());
        debug!("Started {} workers", pool.threads());

        for chunk_id in 0..plan.initial_chunks {
            let config = Arc::clone(&self.config);
            let handle = pool.submit(move || {
                let sorter = ChunkSorter::new(config.chunk_size);
                let report = sorter.sort_chunk(chunk_id, &config.chunk_path(chunk_id))?;
                debug!("Chunk #{} sorted", chunk_id);
                Ok(report)
            });
            registry.register(chunk_id, handle);
        }

        let scheduler = MergeScheduler::new(Arc::clone(&self.config), Arc::clone(&registry));
        scheduler.submit_plan(&pool, plan);

        let report = registry.claim(final_chunk, final_chunk)?.wait()?;
        if !registry.is_empty() {
            return Err(SortError::dependency(
                final_chunk,
                format!("{} task results were never consumed", registry.len()),
            ));
        }
        Ok(report)
    }
}
