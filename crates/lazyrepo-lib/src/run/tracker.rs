use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use lazypath::AnchoredUnixPathBuf;
use lazyrepo_task_id::TaskKey;

/// Where a task ended up this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    /// Ran its command and exited zero.
    SuccessEager,
    /// Skipped because its manifest matched the previous run.
    SuccessLazy,
    Failure(Option<i32>),
    Skipped,
}

impl TaskStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::SuccessEager | TaskStatus::SuccessLazy)
    }

    pub fn blocks_downstream(&self) -> bool {
        matches!(self, TaskStatus::Failure(_) | TaskStatus::Skipped)
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    statuses: HashMap<TaskKey, TaskStatus>,
    /// The per-run `TaskKey -> input manifest cache key` map. Task nodes
    /// stay immutable; this is the only mutable record of a task's hash.
    cache_keys: HashMap<TaskKey, String>,
    output_files: HashMap<TaskKey, Vec<AnchoredUnixPathBuf>>,
}

/// Shared per-run state the scheduler fills in as tasks complete. Multiple
/// task futures read and write it concurrently.
#[derive(Debug, Clone, Default)]
pub struct RunTracker {
    state: Arc<Mutex<TrackerState>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub eager: usize,
    pub lazy: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, key: &TaskKey, status: TaskStatus) {
        self.state
            .lock()
            .expect("tracker lock poisoned")
            .statuses
            .insert(key.clone(), status);
    }

    pub fn status(&self, key: &TaskKey) -> TaskStatus {
        self.state
            .lock()
            .expect("tracker lock poisoned")
            .statuses
            .get(key)
            .copied()
            .unwrap_or(TaskStatus::Pending)
    }

    pub fn set_cache_key(&self, key: &TaskKey, cache_key: String) {
        self.state
            .lock()
            .expect("tracker lock poisoned")
            .cache_keys
            .insert(key.clone(), cache_key);
    }

    pub fn cache_key(&self, key: &TaskKey) -> Option<String> {
        self.state
            .lock()
            .expect("tracker lock poisoned")
            .cache_keys
            .get(key)
            .cloned()
    }

    pub fn set_output_files(&self, key: &TaskKey, files: Vec<AnchoredUnixPathBuf>) {
        self.state
            .lock()
            .expect("tracker lock poisoned")
            .output_files
            .insert(key.clone(), files);
    }

    pub fn output_files(&self, key: &TaskKey) -> Vec<AnchoredUnixPathBuf> {
        self.state
            .lock()
            .expect("tracker lock poisoned")
            .output_files
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Keys of failed tasks with their exit codes, sorted by key.
    pub fn failures(&self) -> Vec<(TaskKey, Option<i32>)> {
        let state = self.state.lock().expect("tracker lock poisoned");
        let mut failures: Vec<_> = state
            .statuses
            .iter()
            .filter_map(|(key, status)| match status {
                TaskStatus::Failure(code) => Some((key.clone(), *code)),
                _ => None,
            })
            .collect();
        failures.sort_by(|(a, _), (b, _)| a.cmp(b));
        failures
    }

    pub fn counts(&self) -> StatusCounts {
        let state = self.state.lock().expect("tracker lock poisoned");
        let mut counts = StatusCounts::default();
        for status in state.statuses.values() {
            match status {
                TaskStatus::SuccessEager => counts.eager += 1,
                TaskStatus::SuccessLazy => counts.lazy += 1,
                TaskStatus::Failure(_) => counts.failed += 1,
                TaskStatus::Skipped => counts.skipped += 1,
                TaskStatus::Pending | TaskStatus::Running => {}
            }
        }
        counts
    }
}
