use std::sync::{Arc, Mutex};

use futures::{stream::FuturesUnordered, StreamExt};
use lazypath::{AbsoluteSystemPath, AbsoluteSystemPathBuf, AnchoredUnixPathBuf};
use lazyrepo_config::{BaseCacheConfig, CacheSettings, RunType};
use lazyrepo_engine::{Engine, ExecutionOptions, Message, ScheduledTask, StopExecution};
use lazyrepo_manifest::{manifest_path, EntryType, ManifestBuilder, ManifestSummary};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    process::{ChildExit, ProcessManager},
    run::{
        inputs::{enumerate_inputs, enumerate_outputs},
        tracker::{RunTracker, TaskStatus},
        ui::{ColorSelector, TaskLogger},
    },
    Error,
};

/// Drives the scheduled tasks the engine emits: builds each task's input
/// manifest, decides cache hit vs. miss, spawns commands on miss, and
/// records statuses, cache keys, and output files in the run tracker.
pub struct Visitor {
    ctx: Arc<VisitorContext>,
}

struct VisitorContext {
    repo_root: AbsoluteSystemPathBuf,
    base_cache: BaseCacheConfig,
    tracker: RunTracker,
    manager: ProcessManager,
    colors: ColorSelector,
    /// First fatal error hit by any task future. Fatal means a broken
    /// runner invariant or unusable on-disk state, not a failing command.
    fatal: Mutex<Option<Error>>,
}

impl Visitor {
    pub fn new(
        repo_root: AbsoluteSystemPathBuf,
        base_cache: BaseCacheConfig,
        tracker: RunTracker,
        manager: ProcessManager,
    ) -> Self {
        Self {
            ctx: Arc::new(VisitorContext {
                repo_root,
                base_cache,
                tracker,
                manager,
                colors: ColorSelector::default(),
                fatal: Mutex::new(None),
            }),
        }
    }

    pub async fn visit(&self, engine: Arc<Engine>, concurrency: usize) -> Result<(), Error> {
        let (node_sender, mut node_stream) = mpsc::channel(concurrency.max(1));

        let engine_handle = {
            let engine = engine.clone();
            tokio::spawn(engine.execute(ExecutionOptions::new(concurrency), node_sender))
        };

        let mut futures = FuturesUnordered::new();
        while let Some(Message { info, callback }) = node_stream.recv().await {
            let ctx = self.ctx.clone();
            let engine = engine.clone();

            futures.push(tokio::spawn(async move {
                let task = engine
                    .task(&info)
                    .expect("engine emitted a task it does not hold");
                let logger = TaskLogger::new(&task.key, ctx.colors.next_style());

                let response = match ctx.process_task(task, &logger).await {
                    Ok(()) => Ok(()),
                    // A broken scheduler invariant stops the whole run.
                    Err(err @ Error::MissingUpstreamCacheKey { .. }) => {
                        let mut fatal = ctx.fatal.lock().expect("fatal lock poisoned");
                        if fatal.is_none() {
                            *fatal = Some(err);
                        }
                        Err(StopExecution)
                    }
                    // Anything else (unreadable input, manifest write
                    // failure) dooms this task like a failed command;
                    // unrelated branches keep going.
                    Err(err) => {
                        logger.status(&format!("failed: {err}"));
                        ctx.tracker.set_status(&task.key, TaskStatus::Failure(None));
                        Ok(())
                    }
                };
                callback.send(response).ok();
            }));
        }

        engine_handle.await.expect("engine execution panicked")?;
        while let Some(result) = futures.next().await {
            result.expect("task future panicked");
        }

        if let Some(err) = self.ctx.fatal.lock().expect("fatal lock poisoned").take() {
            return Err(err);
        }
        Ok(())
    }
}

impl VisitorContext {
    async fn process_task(&self, task: &ScheduledTask, logger: &TaskLogger) -> Result<(), Error> {
        // A stop signal means nothing new starts.
        if self.manager.is_stopped() {
            self.tracker.set_status(&task.key, TaskStatus::Skipped);
            return Ok(());
        }

        // Transitive failure propagation: any blocked upstream blocks us.
        if task
            .upstream_keys
            .iter()
            .any(|upstream| self.tracker.status(upstream).blocks_downstream())
        {
            logger.status("skipped because an upstream task did not succeed");
            self.tracker.set_status(&task.key, TaskStatus::Skipped);
            return Ok(());
        }

        let state_root = match &task.package_dir {
            Some(dir) => self.repo_root.resolve(dir),
            None => self.repo_root.clone(),
        };

        let Some(settings) = task.task_config.cache.settings() else {
            // Un-cacheable: no manifest at all, always runs.
            return self.execute_task(task, &state_root, logger, None).await;
        };

        let summary = self.build_manifest(task, settings, &state_root)?;
        self.tracker
            .set_cache_key(&task.key, summary.hash.clone());

        if self.is_cache_hit(task, &summary) {
            logger.status("cache hit, skipping");
            self.capture_outputs(task, settings, &state_root)?;
            self.tracker.set_status(&task.key, TaskStatus::SuccessLazy);
            return Ok(());
        }

        self.execute_task(task, &state_root, logger, Some(settings))
            .await
    }

    fn is_cache_hit(&self, task: &ScheduledTask, summary: &ManifestSummary) -> bool {
        !task.force && summary.had_previous && !summary.did_change
    }

    /// Builds the task's input manifest in canonical order: inherited
    /// upstream task inputs, upstream package inputs, env vars, files.
    fn build_manifest(
        &self,
        task: &ScheduledTask,
        settings: &CacheSettings,
        state_root: &AbsoluteSystemPath,
    ) -> Result<ManifestSummary, Error> {
        let mut builder = ManifestBuilder::new(state_root, &task.task_name)?;

        for (upstream, edge) in &task.runs_after_upstreams {
            if !edge.inherits_input {
                continue;
            }
            let cache_key = self.upstream_cache_key(task, upstream)?;
            builder.update(
                EntryType::UpstreamTaskInputs,
                upstream.as_str(),
                &cache_key,
                None,
            )?;
        }

        if task.task_config.run_type != RunType::Independent
            && settings.inherits_input_from_dependencies
        {
            for upstream in &task.package_dep_upstreams {
                let cache_key = self.upstream_cache_key(task, upstream)?;
                builder.update(
                    EntryType::UpstreamPackageInputs,
                    upstream.as_str(),
                    &cache_key,
                    None,
                )?;
            }
        }

        let mut env_names: Vec<&str> = self
            .base_cache
            .env_inputs
            .iter()
            .chain(settings.env_inputs.iter())
            .map(String::as_str)
            .collect();
        env_names.sort_unstable();
        env_names.dedup();
        for name in env_names {
            let value = std::env::var(name).unwrap_or_default();
            builder.update(
                EntryType::EnvVar,
                name,
                &lazyrepo_hash::hash_string(value),
                None,
            )?;
        }

        let extra_files = self.upstream_output_files(task, settings);
        let files = enumerate_inputs(
            &self.repo_root,
            state_root,
            task.package_dir.as_deref(),
            Some(settings),
            &self.base_cache,
            &extra_files,
        )?
        .expect("cache settings are present, so the input set exists");

        for file in files {
            let absolute = self.repo_root.resolve(&file);
            let metadata = match absolute.metadata() {
                Ok(metadata) => metadata,
                Err(err) if err.is_io_error(std::io::ErrorKind::NotFound) => {
                    // Deleted between walk and stat; it is not an input.
                    debug!("input {file} vanished during manifest build");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let mtime = mtime_ms(&metadata);
            if builder.copy_line_over_if_meta_is_same(EntryType::File, file.as_str(), &mtime)? {
                continue;
            }
            let hash = lazyrepo_hash::hash_file(&absolute)?;
            builder.update(EntryType::File, file.as_str(), &hash, Some(&mtime))?;
        }

        Ok(builder.end()?)
    }

    fn upstream_cache_key(
        &self,
        task: &ScheduledTask,
        upstream: &lazyrepo_task_id::TaskKey,
    ) -> Result<String, Error> {
        self.tracker
            .cache_key(upstream)
            .ok_or_else(|| Error::MissingUpstreamCacheKey {
                task: task.key.clone(),
                upstream: upstream.clone(),
            })
    }

    /// Output files of upstreams whose edges feed outputs downstream.
    fn upstream_output_files(
        &self,
        task: &ScheduledTask,
        settings: &CacheSettings,
    ) -> Vec<AnchoredUnixPathBuf> {
        let mut files = Vec::new();
        for (upstream, edge) in &task.runs_after_upstreams {
            if edge.uses_output {
                files.extend(self.tracker.output_files(upstream));
            }
        }
        if settings.uses_output_from_dependencies {
            for upstream in &task.package_dep_upstreams {
                files.extend(self.tracker.output_files(upstream));
            }
        }
        files
    }

    async fn execute_task(
        &self,
        task: &ScheduledTask,
        state_root: &AbsoluteSystemPath,
        logger: &TaskLogger,
        settings: Option<&CacheSettings>,
    ) -> Result<(), Error> {
        let command = command_with_args(&task.command, &task.extra_args);
        logger.status(&format!("running: {command}"));
        self.tracker.set_status(&task.key, TaskStatus::Running);

        let exit = self.manager.run(&command, state_root, logger).await?;
        match exit {
            ChildExit::Finished(Some(0)) => {
                if let Some(settings) = settings {
                    self.capture_outputs(task, settings, state_root)?;
                }
                self.tracker
                    .set_status(&task.key, TaskStatus::SuccessEager);
            }
            ChildExit::Finished(code) => {
                logger.status(&match code {
                    Some(code) => format!("failed with exit code {code}"),
                    None => "failed without an exit code".to_owned(),
                });
                self.tracker.set_status(&task.key, TaskStatus::Failure(code));
                self.discard_manifest(task, state_root, settings);
            }
            ChildExit::Killed => {
                // Aborted by a signal: the freshly written manifest must
                // not survive, the task never completed.
                self.tracker.set_status(&task.key, TaskStatus::Skipped);
                self.discard_manifest(task, state_root, settings);
            }
        }
        Ok(())
    }

    /// A failed or aborted command invalidates the manifest finalized just
    /// before the run, so the next invocation runs the task again.
    fn discard_manifest(
        &self,
        task: &ScheduledTask,
        state_root: &AbsoluteSystemPath,
        settings: Option<&CacheSettings>,
    ) {
        if settings.is_none() {
            return;
        }
        let path = manifest_path(state_root, &task.task_name);
        if let Err(err) = path.remove_file() {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("unable to discard manifest {path}: {err}");
            }
        }
    }

    fn capture_outputs(
        &self,
        task: &ScheduledTask,
        settings: &CacheSettings,
        state_root: &AbsoluteSystemPath,
    ) -> Result<(), Error> {
        let outputs = enumerate_outputs(state_root, task.package_dir.as_deref(), settings)?;
        self.tracker.set_output_files(&task.key, outputs);
        Ok(())
    }
}

fn mtime_ms(metadata: &std::fs::Metadata) -> String {
    metadata
        .modified()
        .ok()
        .and_then(|mtime| mtime.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_millis().to_string())
        .unwrap_or_else(|| "0".to_owned())
}

fn command_with_args(command: &str, extra_args: &[String]) -> String {
    if extra_args.is_empty() {
        return command.to_owned();
    }
    let mut full = String::from(command);
    for arg in extra_args {
        full.push(' ');
        full.push_str(&shell_quote(arg));
    }
    full
}

fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:".contains(c))
    {
        arg.to_owned()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod test {
    use test_case::test_case;

    use super::*;

    #[test_case("npm run build", &[], "npm run build" ; "no extra args")]
    #[test_case("tsc", &["--watch"], "tsc --watch" ; "plain arg")]
    #[test_case("echo", &["hello world"], "echo 'hello world'" ; "arg with space")]
    #[test_case("echo", &["it's"], r"echo 'it'\''s'" ; "arg with quote")]
    fn test_command_with_args(command: &str, extra: &[&str], expected: &str) {
        let extra: Vec<String> = extra.iter().map(|s| s.to_string()).collect();
        assert_eq!(command_with_args(command, &extra), expected);
    }
}
