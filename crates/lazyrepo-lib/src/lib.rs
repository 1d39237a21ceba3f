//! Library backing the `lazy` binary: CLI surface, run orchestration, the
//! scheduler, and child process handling. The correctness-critical pieces
//! (manifest format, task graph, hashing) live in their own crates; this one
//! wires them to the filesystem and the terminal.

pub mod cli;
mod commands;
mod opts;
mod process;
mod run;
mod signal;
mod task_graph;
mod tracing;

pub use cli::main;
pub use opts::Opts;
pub use run::Run;

use lazyrepo_task_id::TaskKey;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] lazyrepo_config::Error),
    #[error(transparent)]
    Repository(#[from] lazyrepo_repository::Error),
    #[error(transparent)]
    Engine(#[from] lazyrepo_engine::Error),
    #[error(transparent)]
    Manifest(#[from] lazyrepo_manifest::Error),
    #[error(transparent)]
    Hash(#[from] lazyrepo_hash::Error),
    #[error(transparent)]
    Path(#[from] lazypath::PathError),
    #[error(transparent)]
    TaskKey(#[from] lazyrepo_task_id::Error),
    #[error(transparent)]
    Walk(#[from] lazyrepo_globwalk::WalkError),
    #[error(transparent)]
    Execute(#[from] lazyrepo_engine::ExecuteError),
    #[error("no tasks matched '{task_name}' in this workspace")]
    NoTasksMatched { task_name: String },
    #[error(
        "upstream task {upstream} has no input manifest cache key while scheduling {task}; this \
         is a bug in the task scheduler"
    )]
    MissingUpstreamCacheKey { task: TaskKey, upstream: TaskKey },
    #[error("unable to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
