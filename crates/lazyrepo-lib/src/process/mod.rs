//! Child process handling for task commands.
//!
//! Commands run through the platform shell in their package directory, with
//! stdout and stderr streamed line-by-line to the task's logger. A shared
//! stop signal lets the runner abort everything that is still running when
//! a terminating signal arrives; stopped tasks report `ChildExit::Killed`
//! and never update any manifest.

use std::process::Stdio;

use lazypath::AbsoluteSystemPath;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command as TokioCommand,
    sync::watch,
};
use tracing::debug;

use crate::{run::ui::TaskLogger, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Finished(Option<i32>),
    Killed,
}

impl ChildExit {
    pub fn succeeded(&self) -> bool {
        matches!(self, ChildExit::Finished(Some(0)))
    }
}

/// Spawns task commands and remembers how to stop them.
#[derive(Debug, Clone)]
pub struct ProcessManager {
    stop: watch::Sender<bool>,
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessManager {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self { stop }
    }

    /// Signals every running child to shut down.
    pub fn stop(&self) {
        self.stop.send(true).ok();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Runs `command` through the shell in `cwd`, streaming output through
    /// `logger`. The child inherits the parent environment. Resolves once
    /// the child exits or the manager is stopped.
    pub async fn run(
        &self,
        command: &str,
        cwd: &AbsoluteSystemPath,
        logger: &TaskLogger,
    ) -> Result<ChildExit, Error> {
        let mut stop_rx = self.stop.subscribe();
        if *stop_rx.borrow() {
            return Ok(ChildExit::Killed);
        }

        let mut child = shell_command(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                command: command.to_owned(),
                source,
            })?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");
        let out_logger = logger.clone();
        let err_logger = logger.clone();
        let forward_out = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                out_logger.line(&line);
            }
        });
        let forward_err = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                err_logger.line(&line);
            }
        });

        let exit = tokio::select! {
            status = child.wait() => {
                ChildExit::Finished(status?.code())
            }
            _ = stop_rx.changed() => {
                debug!("killing child process for: {command}");
                child.start_kill().ok();
                child.wait().await.ok();
                ChildExit::Killed
            }
        };

        forward_out.await.ok();
        forward_err.await.ok();

        Ok(exit)
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> TokioCommand {
    let mut cmd = TokioCommand::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> TokioCommand {
    let mut cmd = TokioCommand::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}
