//! Orchestration of one `lazy run` invocation: workspace discovery, config
//! loading, task graph construction, and scheduling.

pub mod inputs;
mod summary;
pub mod tracker;
pub mod ui;

use std::sync::Arc;

use lazypath::AbsoluteSystemPathBuf;
use lazyrepo_config::ConfigLoader;
use lazyrepo_engine::{EngineBuilder, RequestedTask};
use lazyrepo_repository::{infer_repo_root, Workspace};
use tracing::debug;

use crate::{
    opts::Opts, process::ProcessManager, run::tracker::RunTracker, signal,
    task_graph::Visitor, Error,
};

pub struct Run {
    opts: Opts,
}

impl Run {
    pub fn new(opts: Opts) -> Self {
        Self { opts }
    }

    pub async fn run(&self) -> Result<i32, Error> {
        let (repo_root, package_manager) = infer_repo_root(&self.opts.cwd)?;
        debug!("repo root {repo_root}, package manager {package_manager}");

        let workspace = Workspace::discover(&repo_root, package_manager)?;
        let config = ConfigLoader::load(&repo_root, workspace.package_dirs())?;

        let requested = RequestedTask {
            task_name: self.opts.task_name.clone(),
            filter_paths: self.resolve_filters(&repo_root)?,
            force: self.opts.force,
            extra_args: self.opts.pass_through_args.clone(),
        };
        let engine = Arc::new(
            EngineBuilder::new(&workspace, &config)
                .with_tasks([requested])
                .build()?,
        );
        if engine.is_empty() {
            return Err(Error::NoTasksMatched {
                task_name: self.opts.task_name.clone(),
            });
        }
        debug!(
            "scheduled {} tasks: {}",
            engine.len(),
            engine
                .sorted_task_keys()
                .iter()
                .map(|key| key.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let tracker = RunTracker::new();
        let manager = ProcessManager::new();

        // A terminating signal aborts children and stops scheduling; no
        // further manifest is finalized after that point.
        let signal_handle = {
            let manager = manager.clone();
            tokio::spawn(async move {
                signal::wait_for_signal().await;
                manager.stop();
            })
        };

        let visitor = Visitor::new(
            repo_root.clone(),
            config.base_cache_config(),
            tracker.clone(),
            manager.clone(),
        );
        let result = visitor.visit(engine, self.opts.concurrency).await;
        signal_handle.abort();
        result?;

        Ok(summary::report(&tracker, manager.is_stopped()))
    }

    fn resolve_filters(
        &self,
        repo_root: &AbsoluteSystemPathBuf,
    ) -> Result<Vec<lazypath::AnchoredUnixPathBuf>, Error> {
        self.opts
            .filter
            .iter()
            .map(|raw| {
                let absolute = AbsoluteSystemPathBuf::from_unknown(&self.opts.cwd, raw.clone());
                Ok(repo_root.anchor(&absolute)?)
            })
            .collect()
    }
}
