//! Fixed-size worker pool with blocking task handles.
//!
//! Tasks run in submission order (`spawn_fifo`). A task may block on the
//! handle of any task submitted *before* it: every such task has already been
//! picked up by a worker or finished, so the wait always makes progress even
//! with a single worker.

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::external_sort::constants::WORKER_THREAD_PREFIX;
use crate::external_sort::error::{Result, SortError};
use crate::external_sort::ChunkId;

pub struct TaskPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl TaskPool {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("{}-{}", WORKER_THREAD_PREFIX, index))
            .build()
            .map_err(|e| SortError::WorkerPool(e.to_string()))?;
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Queues `task` and returns a handle for its result.
    pub fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let slot = Arc::new(TaskSlot::default());
        let producer = Arc::clone(&slot);

        self.pool.spawn_fifo(move || {
            let outcome = catch_unwind(AssertUnwindSafe(task))
                .unwrap_or_else(|payload| Err(SortError::TaskPanicked(panic_message(payload))));
            producer.complete(outcome);
        });

        TaskHandle { slot }
    }
}

struct TaskSlot<T> {
    outcome: Mutex<Option<Result<T>>>,
    done: Condvar,
}

impl<T> Default for TaskSlot<T> {
    fn default() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }
}

impl<T> TaskSlot<T> {
    fn complete(&self, outcome: Result<T>) {
        let mut guard = self.outcome.lock();
        *guard = Some(outcome);
        self.done.notify_all();
    }
}

/// Handle to a submitted task. Waiting consumes it, so each result has exactly
/// one receiver.
pub struct TaskHandle<T> {
    slot: Arc<TaskSlot<T>>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task finished and returns its result or error.
    pub fn wait(self) -> Result<T> {
        let mut guard = self.slot.outcome.lock();
        loop {
            if let Some(outcome) = guard.take() {
                return outcome;
            }
            self.slot.done.wait(&mut guard);
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Shared lookup from task id to its pending handle.
///
/// Tasks are registered right after submission and before any task that
/// depends on them is submitted. Each id is claimed exactly once, by the task
/// that consumes the chunk it produces.
pub struct TaskRegistry<T> {
    handles: Mutex<HashMap<ChunkId, TaskHandle<T>>>,
}

impl<T> Default for TaskRegistry<T> {
    fn default() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> TaskRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ChunkId, handle: TaskHandle<T>) {
        self.handles.lock().insert(id, handle);
    }

    /// Removes the handle for `id` on behalf of the task producing `consumer`.
    pub fn claim(&self, id: ChunkId, consumer: ChunkId) -> Result<TaskHandle<T>> {
        self.handles.lock().remove(&id).ok_or_else(|| {
            SortError::dependency(consumer, format!("no task registered for chunk {}", id))
        })
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
