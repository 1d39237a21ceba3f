use std::collections::HashSet;

use lazypath::{AnchoredUnixPath, AnchoredUnixPathBuf};
use lazyrepo_config::{ConfigLoader, RunType, TaskConfig};
use lazyrepo_repository::{Package, Workspace};
use lazyrepo_task_id::TaskKey;
use tracing::debug;

use crate::{Building, Built, Engine, Error, ScheduledTask};

/// One user request: a task name plus its run modifiers.
#[derive(Debug, Clone, Default)]
pub struct RequestedTask {
    pub task_name: String,
    /// Repo-relative directory filters; empty means every package.
    pub filter_paths: Vec<AnchoredUnixPathBuf>,
    pub force: bool,
    pub extra_args: Vec<String>,
}

/// Resolves requested tasks into a sealed task graph.
pub struct EngineBuilder<'a> {
    workspace: &'a Workspace,
    config: &'a ConfigLoader,
    requested: Vec<RequestedTask>,
}

impl<'a> EngineBuilder<'a> {
    pub fn new(workspace: &'a Workspace, config: &'a ConfigLoader) -> Self {
        Self {
            workspace,
            config,
            requested: Vec::new(),
        }
    }

    pub fn with_tasks<I: IntoIterator<Item = RequestedTask>>(mut self, tasks: I) -> Self {
        self.requested = tasks.into_iter().collect();
        self
    }

    pub fn build(self) -> Result<Engine<Built>, Error> {
        let mut engine = Engine::<Building>::new();

        // Phase one: emit nodes. A node exists only where a command
        // resolves, either from config or from the package's scripts.
        let mut nodes: Vec<NodeSeed> = Vec::new();
        for requested in &self.requested {
            // Run shape is decided by the root-scope resolution; package
            // configs adjust caching and edges but not where nodes go.
            let root_scope = self.config.task_config(None, &requested.task_name);
            if root_scope.run_type == RunType::TopLevel {
                let command = root_scope.base_command.clone().or_else(|| {
                    self.workspace
                        .root_package_json
                        .scripts
                        .get(&requested.task_name)
                        .cloned()
                });
                let Some(command) = command else {
                    debug!(
                        "top-level task {} has no command, skipping",
                        requested.task_name
                    );
                    continue;
                };
                nodes.push(NodeSeed {
                    key: TaskKey::root(&requested.task_name)?,
                    package: None,
                    task_config: root_scope,
                    command,
                    requested: requested.clone(),
                });
                continue;
            }

            for package in self.workspace.packages() {
                if !matches_filters(&package.dir, &requested.filter_paths) {
                    continue;
                }
                let task_config = self
                    .config
                    .task_config(Some(&package.dir), &requested.task_name);
                let command = task_config
                    .base_command
                    .clone()
                    .or_else(|| package.scripts.get(&requested.task_name).cloned());
                let Some(command) = command else {
                    continue;
                };
                nodes.push(NodeSeed {
                    key: TaskKey::new(&requested.task_name, &package.dir)?,
                    package: Some(package),
                    task_config,
                    command,
                    requested: requested.clone(),
                });
            }
        }

        let existing: HashSet<TaskKey> = nodes.iter().map(|seed| seed.key.clone()).collect();

        // Phase two: edges, now that node existence is known.
        for seed in nodes {
            let mut package_dep_upstreams = Vec::new();
            if seed.task_config.run_type == RunType::Dependent {
                if let Some(package) = seed.package {
                    for dep_name in &package.local_deps {
                        let dep_package = self
                            .workspace
                            .package_by_name(dep_name)
                            .expect("local_deps only name workspace packages");
                        let upstream = TaskKey::new(&seed.requested.task_name, &dep_package.dir)?;
                        if existing.contains(&upstream) {
                            package_dep_upstreams.push(upstream);
                        }
                    }
                }
            }
            package_dep_upstreams.sort();

            let mut runs_after_upstreams = Vec::new();
            for (other_task, edge_config) in &seed.task_config.runs_after {
                let other_root_scope = self.config.task_config(None, other_task);
                let upstream = if other_root_scope.run_type == RunType::TopLevel {
                    TaskKey::root(other_task)?
                } else {
                    match &seed.package {
                        Some(package) => TaskKey::new(other_task, &package.dir)?,
                        // A top-level task can only run after other
                        // top-level tasks.
                        None => TaskKey::root(other_task)?,
                    }
                };
                if existing.contains(&upstream) && upstream != seed.key {
                    runs_after_upstreams.push((upstream, edge_config.clone()));
                }
            }
            runs_after_upstreams.sort_by(|(a, _), (b, _)| a.cmp(b));

            let mut upstream_keys: Vec<TaskKey> = package_dep_upstreams
                .iter()
                .chain(runs_after_upstreams.iter().map(|(key, _)| key))
                .cloned()
                .collect();
            upstream_keys.sort();
            upstream_keys.dedup();

            for upstream in &upstream_keys {
                engine.add_dependency(&seed.key, upstream);
            }

            engine.add_task(ScheduledTask {
                key: seed.key,
                task_name: seed.requested.task_name.clone(),
                package_dir: seed.package.map(|package| package.dir.clone()),
                task_config: seed.task_config,
                command: seed.command,
                runs_after_upstreams,
                package_dep_upstreams,
                upstream_keys,
                force: seed.requested.force,
                extra_args: seed.requested.extra_args,
            });
        }

        engine.seal()
    }
}

struct NodeSeed<'a> {
    key: TaskKey,
    package: Option<&'a Package>,
    task_config: TaskConfig,
    command: String,
    requested: RequestedTask,
}

/// A package matches when its directory and a filter path coincide or one
/// contains the other, so both "everything under packages/" and "the
/// package holding this subdirectory" select as expected.
fn matches_filters(package_dir: &AnchoredUnixPath, filters: &[AnchoredUnixPathBuf]) -> bool {
    if filters.is_empty() {
        return true;
    }
    filters
        .iter()
        .any(|filter| filter.contains(package_dir) || package_dir.contains(filter))
}
