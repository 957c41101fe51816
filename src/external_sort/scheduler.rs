use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::external_sort::chunk::{remove_chunks, ChunkReport};
use crate::external_sort::config::RunConfig;
use crate::external_sort::error::{Result, SortError};
use crate::external_sort::merger::ChunkMerger;
use crate::external_sort::pool::{TaskPool, TaskRegistry};
use crate::external_sort::ChunkId;

/// One merge task: combine `inputs` into the chunk `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTask {
    pub output: ChunkId,
    pub inputs: Vec<ChunkId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    pub index: usize,
    pub tasks: Vec<MergeTask>,
}

/// The complete merge dependency graph, fixed before any merge is submitted.
///
/// Wave `w` takes the chunk ids that survived wave `w - 1` (the sorted
/// initial chunks for wave 0), groups them in order `ways` at a time and
/// gives each group the next unused id. The last group of a wave may be
/// smaller than `ways`, down to a single pass-through input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub initial_chunks: usize,
    pub ways: usize,
    pub waves: Vec<Wave>,
}

impl MergePlan {
    pub fn build(initial_chunks: usize, ways: usize) -> Self {
        debug_assert!(ways >= 2, "merge fan-in must be at least 2");
        let mut waves = Vec::new();
        let mut active: Vec<ChunkId> = (0..initial_chunks).collect();
        let mut next_id = initial_chunks;

        while active.len() > 1 {
            let tasks: Vec<MergeTask> = active
                .chunks(ways)
                .map(|group| {
                    let task = MergeTask {
                        output: next_id,
                        inputs: group.to_vec(),
                    };
                    next_id += 1;
                    task
                })
                .collect();

            active = tasks.iter().map(|task| task.output).collect();
            waves.push(Wave {
                index: waves.len(),
                tasks,
            });
        }

        Self {
            initial_chunks,
            ways,
            waves,
        }
    }

    /// The id of the chunk that ends up as the output, if there is any input.
    pub fn final_chunk(&self) -> Option<ChunkId> {
        match self.waves.last() {
            Some(wave) => wave.tasks.last().map(|task| task.output),
            None if self.initial_chunks == 1 => Some(0),
            None => None,
        }
    }

    pub fn task_count(&self) -> usize {
        self.waves.iter().map(|wave| wave.tasks.len()).sum()
    }
}

/// Submits the merge waves of a plan to the pool.
pub struct MergeScheduler {
    config: Arc<RunConfig>,
    registry: Arc<TaskRegistry<ChunkReport>>,
}

impl MergeScheduler {
    pub fn new(config: Arc<RunConfig>, registry: Arc<TaskRegistry<ChunkReport>>) -> Self {
        Self { config, registry }
    }

    /// Submits every wave in order. Each task is registered under its output id
    /// before the next one is submitted, so any consumer finds its producers.
    pub fn submit_plan(&self, pool: &TaskPool, plan: &MergePlan) {
        for wave in &plan.waves {
            info!(
                "Scheduling merge wave {} with {} tasks",
                wave.index,
                wave.tasks.len()
            );
            for task in &wave.tasks {
                let config = Arc::clone(&self.config);
                let registry = Arc::clone(&self.registry);
                let task_spec = task.clone();
                let handle = pool.submit(move || run_merge_task(&config, &registry, &task_spec));
                self.registry.register(task.output, handle);
            }
        }
    }
}

/// Waits for every producer of `task`'s inputs, merges them and deletes the
/// inputs. Inputs are kept on any failure.
fn run_merge_task(
    config: &RunConfig,
    registry: &TaskRegistry<ChunkReport>,
    task: &MergeTask,
) -> Result<ChunkReport> {
    let mut expected_records = 0u64;
    for &input in &task.inputs {
        let report = registry.claim(input, task.output)?.wait()?;
        if report.chunk_id != input {
            return Err(SortError::dependency(
                task.output,
                format!("task for chunk {} reported chunk {}", input, report.chunk_id),
            ));
        }
        expected_records += report.record_count;
    }

    let input_paths: Vec<PathBuf> = task.inputs.iter().map(|&id| config.chunk_path(id)).collect();
    for (id, path) in task.inputs.iter().zip(&input_paths) {
        if !path.exists() {
            return Err(SortError::dependency(
                task.output,
                format!("chunk {} is missing at {}", id, path.display()),
            ));
        }
    }

    debug!("Merging {:?} into {}", task.inputs, task.output);
    let merger = ChunkMerger::new(config.merge_buffer_size());
    let output_path = config.chunk_path(task.output);
    let record_count = merger.merge(&input_paths, &output_path)?;

    if record_count != expected_records {
        return Err(SortError::dependency(
            task.output,
            format!(
                "merged {} records but inputs reported {}",
                record_count, expected_records
            ),
        ));
    }

    // A single input was renamed, so only multi-way merges leave files behind.
    if input_paths.len() > 1 {
        remove_chunks(&input_paths)?;
    }

    Ok(ChunkReport {
        chunk_id: task.output,
        record_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(plan: &MergePlan) -> Vec<Vec<(ChunkId, Vec<ChunkId>)>> {
        plan.waves
            .iter()
            .map(|wave| {
                wave.tasks
                    .iter()
                    .map(|task| (task.output, task.inputs.clone()))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_empty_and_single_chunk_plans() {
        let empty = MergePlan::build(0, 2);
        assert!(empty.waves.is_empty());
        assert_eq!(empty.final_chunk(), None);

        let single = MergePlan::build(1, 2);
        assert!(single.waves.is_empty());
        assert_eq!(single.final_chunk(), Some(0));
    }

    #[test]
    fn test_binary_plan_over_four_chunks() {
        let plan = MergePlan::build(4, 2);
        assert_eq!(
            ids(&plan),
            vec![
                vec![(4, vec![0, 1]), (5, vec![2, 3])],
                vec![(6, vec![4, 5])],
            ]
        );
        assert_eq!(plan.final_chunk(), Some(6));
        assert_eq!(plan.task_count(), 3);
    }

    #[test]
    fn test_odd_tail_is_passed_through() {
        let plan = MergePlan::build(5, 2);
        assert_eq!(
            ids(&plan),
            vec![
                vec![(5, vec![0, 1]), (6, vec![2, 3]), (7, vec![4])],
                vec![(8, vec![5, 6]), (9, vec![7])],
                vec![(10, vec![8, 9])],
            ]
        );
        assert_eq!(plan.final_chunk(), Some(10));
    }

    #[test]
    fn test_wide_fan_in_is_single_wave() {
        let plan = MergePlan::build(3, 8);
        assert_eq!(ids(&plan), vec![vec![(3, vec![0, 1, 2])]]);
    }

    #[test]
    fn test_wave_sizes_shrink_by_fan_in() {
        let plan = MergePlan::build(10, 3);
        let sizes: Vec<usize> = plan.waves.iter().map(|w| w.tasks.len()).collect();
        assert_eq!(sizes, vec![4, 2, 1]);

        // ids continue monotonically after the initial chunks
        let outputs: Vec<ChunkId> = plan
            .waves
            .iter()
            .flat_map(|w| w.tasks.iter().map(|t| t.output))
            .collect();
        assert_eq!(outputs, (10..17).collect::<Vec<_>>());

        // every chunk except the last is consumed exactly once
        let mut consumed: Vec<ChunkId> = plan
            .waves
            .iter()
            .flat_map(|w| w.tasks.iter().flat_map(|t| t.inputs.clone()))
            .collect();
        consumed.sort();
        assert_eq!(consumed, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_missing_predecessor_is_dependency_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::new("in".into(), "out".into(), 64, 1, 2)
            .unwrap()
            .with_work_directory(dir.path());
        let registry = TaskRegistry::new();
        let task = MergeTask {
            output: 2,
            inputs: vec![0, 1],
        };

        let err = run_merge_task(&config, &registry, &task).unwrap_err();
        assert!(matches!(err, SortError::MergeDependency { chunk: 2, .. }));
    }

    #[test]
    fn test_missing_chunk_file_keeps_other_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::new("in".into(), "out".into(), 64, 1, 2)
            .unwrap()
            .with_work_directory(dir.path());
        std::fs::write(config.chunk_path(0), 1i32.to_ne_bytes()).unwrap();

        let pool = TaskPool::new(1).unwrap();
        let registry = TaskRegistry::new();
        for id in 0..2 {
            registry.register(id, pool.submit(move || Ok(ChunkReport { chunk_id: id, record_count: 1 })));
        }
        let task = MergeTask {
            output: 2,
            inputs: vec![0, 1],
        };

        let err = run_merge_task(&config, &registry, &task).unwrap_err();
        assert!(err.to_string().contains("chunk 1 is missing"));
        assert!(config.chunk_path(0).exists());
    }

    #[test]
    fn test_failed_sort_task_reaches_final_wait_and_keeps_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(
            RunConfig::new("in".into(), "out".into(), 64, 1, 2)
                .unwrap()
                .with_work_directory(dir.path()),
        );
        for id in 0..4 {
            std::fs::write(config.chunk_path(id), (id as i32).to_ne_bytes()).unwrap();
        }

        let pool = TaskPool::new(1).unwrap();
        let registry = Arc::new(TaskRegistry::new());
        for id in 0..4 {
            let path = config.chunk_path(id);
            let handle = pool.submit(move || {
                if id == 1 {
                    Err(SortError::ChunkOverflow { path, capacity: 64 })
                } else {
                    Ok(ChunkReport { chunk_id: id, record_count: 1 })
                }
            });
            registry.register(id, handle);
        }

        let plan = MergePlan::build(4, 2);
        MergeScheduler::new(Arc::clone(&config), Arc::clone(&registry)).submit_plan(&pool, &plan);
        let final_chunk = plan.final_chunk().unwrap();

        let err = registry.claim(final_chunk, final_chunk).unwrap().wait().unwrap_err();
        assert!(matches!(err, SortError::ChunkOverflow { capacity: 64, .. }));

        // the failed merge left its inputs alone and produced nothing
        assert!(config.chunk_path(0).exists());
        assert!(config.chunk_path(1).exists());
        assert!(!config.chunk_path(4).exists());
        assert!(!config.chunk_path(final_chunk).exists());

        // the independent side finished on the single worker before the final task
        assert!(!config.chunk_path(2).exists());
        assert!(!config.chunk_path(3).exists());
        let merged = std::fs::read(config.chunk_path(5)).unwrap();
        assert_eq!(crate::external_sort::record::decode_records(&merged), vec![2, 3]);
    }
}
