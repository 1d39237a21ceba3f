//! Task graph construction and execution driving for the lazy task runner.
//!
//! The engine resolves requested tasks against the workspace into
//! [`ScheduledTask`] nodes, wires dependency edges from package dependencies
//! and `runsAfter` rules, and exposes a deterministic dependency-order
//! traversal. Nodes are immutable once the graph is built; all per-run
//! mutable state (statuses, cache keys, output files) lives with the
//! scheduler.

mod builder;
mod execute;

use std::collections::{BTreeMap, HashMap};

use lazypath::AnchoredUnixPathBuf;
use lazyrepo_config::{RunsAfter, TaskConfig};
use lazyrepo_task_id::TaskKey;
use petgraph::Graph;

pub use builder::{EngineBuilder, RequestedTask};
pub use execute::{ExecuteError, ExecutionOptions, Message, StopExecution};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Graph(#[from] lazyrepo_graph_utils::Error),
    #[error(transparent)]
    TaskKey(#[from] lazyrepo_task_id::Error),
}

/// One node of the task graph: a concrete `(package, task)` invocation.
/// Created during graph construction and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub key: TaskKey,
    pub task_name: String,
    /// `None` for top-level tasks, which root at the workspace root.
    pub package_dir: Option<AnchoredUnixPathBuf>,
    pub task_config: TaskConfig,
    /// The shell command to run: `baseCommand`, or the package's script.
    pub command: String,
    /// Upstreams contributed by `runsAfter` rules, with their edge config,
    /// ordered by key.
    pub runs_after_upstreams: Vec<(TaskKey, RunsAfter)>,
    /// Upstreams contributed by package dependencies (same task name in a
    /// local dependency package), sorted ascending by key.
    pub package_dep_upstreams: Vec<TaskKey>,
    /// Every upstream key, deduplicated and sorted. A task may start only
    /// once all of these have finished.
    pub upstream_keys: Vec<TaskKey>,
    pub force: bool,
    pub extra_args: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Building;
#[derive(Debug, Default)]
pub struct Built;

/// The task graph. `Engine<Building>` accepts nodes and edges;
/// [`EngineBuilder::build`] validates, sorts, and seals it into
/// `Engine<Built>`, which only exposes read access and execution.
#[derive(Debug)]
pub struct Engine<S = Built> {
    marker: std::marker::PhantomData<S>,
    task_graph: Graph<TaskKey, ()>,
    task_lookup: HashMap<TaskKey, petgraph::graph::NodeIndex>,
    tasks: BTreeMap<TaskKey, ScheduledTask>,
    sorted_task_keys: Vec<TaskKey>,
}

impl Engine<Building> {
    pub fn new() -> Self {
        Self {
            marker: std::marker::PhantomData,
            task_graph: Graph::default(),
            task_lookup: HashMap::default(),
            tasks: BTreeMap::default(),
            sorted_task_keys: Vec::default(),
        }
    }

    pub fn get_index(&mut self, key: &TaskKey) -> petgraph::graph::NodeIndex {
        self.task_lookup.get(key).copied().unwrap_or_else(|| {
            let index = self.task_graph.add_node(key.clone());
            self.task_lookup.insert(key.clone(), index);
            index
        })
    }

    pub fn add_task(&mut self, task: ScheduledTask) {
        self.get_index(&task.key);
        self.tasks.insert(task.key.clone(), task);
    }

    /// Records that `from` depends on `to`: edges point at dependencies.
    pub fn add_dependency(&mut self, from: &TaskKey, to: &TaskKey) {
        let from = self.get_index(from);
        let to = self.get_index(to);
        self.task_graph.update_edge(from, to, ());
    }

    /// Validates the graph (cycles and self-dependencies are fatal),
    /// computes the deterministic topological order, and seals the engine.
    pub fn seal(self) -> Result<Engine<Built>, Error> {
        lazyrepo_graph_utils::validate_graph(&self.task_graph)?;
        let sorted_task_keys = self.deterministic_topo_order();

        let Engine {
            task_graph,
            task_lookup,
            tasks,
            ..
        } = self;

        Ok(Engine {
            marker: std::marker::PhantomData,
            task_graph,
            task_lookup,
            tasks,
            sorted_task_keys,
        })
    }

    /// Kahn's algorithm with the ready set ordered by ascending `TaskKey`,
    /// so that repeated construction on the same workspace state yields the
    /// same order.
    fn deterministic_topo_order(&self) -> Vec<TaskKey> {
        let mut remaining_deps: HashMap<petgraph::graph::NodeIndex, usize> = self
            .task_graph
            .node_indices()
            .map(|index| {
                (
                    index,
                    self.task_graph
                        .neighbors_directed(index, petgraph::Direction::Outgoing)
                        .count(),
                )
            })
            .collect();

        let mut ready: std::collections::BTreeSet<TaskKey> = remaining_deps
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(index, _)| self.task_graph[*index].clone())
            .collect();

        let mut order = Vec::with_capacity(self.task_graph.node_count());
        while let Some(key) = ready.pop_first() {
            let index = self.task_lookup[&key];
            order.push(key);

            for dependent in self
                .task_graph
                .neighbors_directed(index, petgraph::Direction::Incoming)
            {
                let count = remaining_deps
                    .get_mut(&dependent)
                    .expect("every node has a dep count");
                *count -= 1;
                if *count == 0 {
                    ready.insert(self.task_graph[dependent].clone());
                }
            }
        }

        debug_assert_eq!(
            order.len(),
            self.task_graph.node_count(),
            "topo order must cover the validated graph"
        );
        order
    }
}

impl Default for Engine<Building> {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine<Built> {
    /// Task keys in dependency-respecting, deterministic order.
    pub fn sorted_task_keys(&self) -> &[TaskKey] {
        &self.sorted_task_keys
    }

    pub fn task(&self, key: &TaskKey) -> Option<&ScheduledTask> {
        self.tasks.get(key)
    }

    /// All scheduled tasks, in ascending key order.
    pub fn tasks(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, key: &TaskKey) -> bool {
        self.tasks.contains_key(key)
    }
}
