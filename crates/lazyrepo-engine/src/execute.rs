use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures::{stream::FuturesUnordered, StreamExt};
use lazyrepo_task_id::TaskKey;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::debug;

use crate::{Built, Engine};

/// Envelope sent to the visitor for each ready task. The visitor answers
/// through the callback once the task has been fully handled.
pub struct Message<T, U> {
    pub info: T,
    pub callback: oneshot::Sender<U>,
}

impl<T, U> Message<T, U> {
    pub fn new(info: T) -> (Self, oneshot::Receiver<U>) {
        let (callback, receiver) = oneshot::channel();
        (Self { info, callback }, receiver)
    }
}

type VisitorResult = Result<(), StopExecution>;

/// Sentinel returned by the visitor to stop scheduling further tasks.
/// Tasks already running are unaffected.
#[derive(Debug, Clone, Copy)]
pub struct StopExecution;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    concurrency: usize,
}

impl ExecutionOptions {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("Semaphore closed before all tasks finished")]
    Semaphore(#[from] tokio::sync::AcquireError),
    #[error("Engine visitor closed channel before walk finished")]
    Visitor,
}

impl From<mpsc::error::SendError<Message<TaskKey, VisitorResult>>> for ExecuteError {
    fn from(_: mpsc::error::SendError<Message<TaskKey, VisitorResult>>) -> Self {
        ExecuteError::Visitor
    }
}

impl Engine<Built> {
    /// Walks the task graph in dependency order, emitting each task to the
    /// visitor while honoring the concurrency bound. Tasks whose config
    /// sets `parallel: false` additionally serialize against every other
    /// task with the same name through a per-name mutex.
    pub async fn execute(
        self: Arc<Self>,
        options: ExecutionOptions,
        visitor: mpsc::Sender<Message<TaskKey, VisitorResult>>,
    ) -> Result<(), ExecuteError> {
        let ExecutionOptions { concurrency } = options;
        let semaphore = Arc::new(Semaphore::new(concurrency));

        // One mutex per task name that has any serial task.
        let serial_locks: HashMap<String, Arc<tokio::sync::Mutex<()>>> = self
            .tasks()
            .filter(|task| !task.task_config.parallel)
            .map(|task| (task.task_name.clone(), Arc::new(tokio::sync::Mutex::new(()))))
            .collect();

        let mut handles: FuturesUnordered<tokio::task::JoinHandle<Result<(), ExecuteError>>> =
            FuturesUnordered::new();

        let (walker, mut nodes) =
            lazyrepo_graph_utils::Walker::new(&self.task_graph).walk();
        let walker = Arc::new(Mutex::new(walker));

        while let Some((node_id, done)) = nodes.recv().await {
            let visitor = visitor.clone();
            let semaphore = semaphore.clone();
            let walker = walker.clone();
            let this = self.clone();
            let serial_lock = {
                let key = &this.task_graph[node_id];
                this.task(key)
                    .filter(|task| !task.task_config.parallel)
                    .and_then(|task| serial_locks.get(&task.task_name))
                    .cloned()
            };

            handles.push(tokio::spawn(async move {
                let key = this.task_graph[node_id].clone();

                // Serialize same-named tasks before taking a permit so a
                // waiting serial task doesn't pin down concurrency.
                let _serial_guard = match &serial_lock {
                    Some(lock) => Some(lock.lock().await),
                    None => None,
                };
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("concurrency semaphore closed while tasks still queued");

                let (message, result) = Message::new(key);
                visitor.send(message).await?;

                if let Err(StopExecution) = result.await.unwrap_or_else(|_| {
                    // A dropped callback counts as a completed task.
                    debug!("visitor dropped callback sender without sending a result");
                    Ok(())
                }) {
                    if walker
                        .lock()
                        .expect("walker mutex poisoned")
                        .cancel()
                        .is_err()
                    {
                        debug!("unable to cancel graph walk");
                    }
                }
                if done.send(()).is_err() {
                    debug!("graph walk done receiver closed before node finished");
                }
                Ok(())
            }));
        }

        while let Some(result) = handles.next().await {
            result.expect("unable to join task")?;
        }

        Ok(())
    }
}
