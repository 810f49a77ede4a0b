use crate::engine::config::RunConfig;
use crate::engine::pipeline::FeaturePipeline;
use crate::engine::task::{Task, TaskError, TaskErrorKind, TaskOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// A resolved task as handed from the pool to the collector. Exactly one of
/// these exists per generated task, whatever its fate.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTask {
    pub structure_id: String,
    pub repeat_index: u32,
    pub seed: Option<u64>,
    pub outcome: TaskOutcome,
}

type TaskKey = (String, u32, Option<u64>);

/// Bounded pool of concurrently executing pipeline invocations.
///
/// The semaphore permit is acquired before the pipeline is invoked and the
/// per-task timeout starts only once the permit is held, so queued tasks
/// never time out while waiting for a slot and the configured bound on
/// simultaneous pipeline invocations is never exceeded.
pub struct WorkerPool {
    pipeline: Arc<dyn FeaturePipeline>,
    semaphore: Arc<Semaphore>,
    task_timeout: Duration,
}

impl WorkerPool {
    pub fn new(pipeline: Arc<dyn FeaturePipeline>, config: &RunConfig) -> Self {
        Self {
            pipeline,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            task_timeout: config.task_timeout,
        }
    }

    /// Drain mode: wait for the entire batch, then return every outcome at
    /// once. Completion order within the batch is not meaningful.
    pub async fn drain(
        &self,
        tasks: Vec<Task>,
        cancel: watch::Receiver<bool>,
    ) -> Vec<CompletedTask> {
        let mut batch = Vec::with_capacity(tasks.len());
        self.execute(tasks, cancel, |done| batch.push(done)).await;
        batch
    }

    /// Incremental mode: deliver each outcome to `on_complete` the moment it
    /// resolves, never waiting on slower siblings.
    pub async fn stream(
        &self,
        tasks: Vec<Task>,
        cancel: watch::Receiver<bool>,
        on_complete: impl FnMut(CompletedTask),
    ) {
        self.execute(tasks, cancel, on_complete).await;
    }

    async fn execute(
        &self,
        tasks: Vec<Task>,
        mut cancel: watch::Receiver<bool>,
        mut on_complete: impl FnMut(CompletedTask),
    ) {
        let mut in_flight: JoinSet<CompletedTask> = JoinSet::new();
        let mut pending: HashMap<tokio::task::Id, TaskKey> = HashMap::new();

        for task in tasks {
            let key = (task.structure.id.clone(), task.repeat_index, task.seed);
            let handle = in_flight.spawn(Self::run_one(
                Arc::clone(&self.pipeline),
                Arc::clone(&self.semaphore),
                self.task_timeout,
                task,
            ));
            pending.insert(handle.id(), key);
        }

        let mut cancelled = false;
        let mut cancel_closed = false;
        loop {
            tokio::select! {
                joined = in_flight.join_next_with_id() => {
                    match joined {
                        None => break,
                        Some(result) => {
                            on_complete(Self::resolve(result, &mut pending));
                        }
                    }
                }
                changed = cancel.changed(), if !cancel_closed => {
                    match changed {
                        Ok(()) if *cancel.borrow() => {
                            cancelled = true;
                            break;
                        }
                        Ok(()) => {}
                        // Sender dropped without signalling; cancellation can
                        // no longer occur.
                        Err(_) => cancel_closed = true,
                    }
                }
            }
        }

        if cancelled {
            warn!("Run cancelled; abandoning in-flight tasks");
            in_flight.abort_all();
            while let Some(result) = in_flight.join_next_with_id().await {
                on_complete(Self::resolve(result, &mut pending));
            }
            // Anything still unresolved (should be none) gets a terminal
            // cancelled outcome rather than vanishing.
            for (_, key) in pending.drain() {
                on_complete(Self::cancelled_outcome(key));
            }
        }
    }

    async fn run_one(
        pipeline: Arc<dyn FeaturePipeline>,
        semaphore: Arc<Semaphore>,
        task_timeout: Duration,
        task: Task,
    ) -> CompletedTask {
        let outcome = match semaphore.acquire_owned().await {
            Err(_) => TaskOutcome::Failure {
                error: TaskError::new(
                    TaskErrorKind::Cancelled,
                    "scheduler",
                    "worker pool shut down before the task could run",
                ),
            },
            Ok(_permit) => match tokio::time::timeout(task_timeout, pipeline.run(&task)).await {
                Ok(Ok(metrics)) => TaskOutcome::Success { metrics },
                Ok(Err(error)) => TaskOutcome::Failure { error },
                Err(_) => TaskOutcome::Failure {
                    error: TaskError::new(
                        TaskErrorKind::Timeout,
                        "pipeline",
                        format!("task exceeded timeout of {}s", task_timeout.as_secs_f64()),
                    ),
                },
            },
        };

        debug!(
            structure = %task.structure.id,
            repeat = task.repeat_index,
            success = outcome.is_success(),
            "Task resolved"
        );

        CompletedTask {
            structure_id: task.structure.id,
            repeat_index: task.repeat_index,
            seed: task.seed,
            outcome,
        }
    }

    fn resolve(
        result: Result<(tokio::task::Id, CompletedTask), tokio::task::JoinError>,
        pending: &mut HashMap<tokio::task::Id, TaskKey>,
    ) -> CompletedTask {
        match result {
            Ok((id, done)) => {
                pending.remove(&id);
                done
            }
            Err(join_error) => {
                let key = pending
                    .remove(&join_error.id())
                    .unwrap_or_else(|| (String::from("unknown"), 0, None));
                if join_error.is_cancelled() {
                    Self::cancelled_outcome(key)
                } else {
                    let (structure_id, repeat_index, seed) = key;
                    CompletedTask {
                        structure_id,
                        repeat_index,
                        seed,
                        outcome: TaskOutcome::Failure {
                            error: TaskError::new(
                                TaskErrorKind::Tool,
                                "scheduler",
                                format!("worker panicked: {join_error}"),
                            ),
                        },
                    }
                }
            }
        }
    }

    fn cancelled_outcome(key: TaskKey) -> CompletedTask {
        let (structure_id, repeat_index, seed) = key;
        CompletedTask {
            structure_id,
            repeat_index,
            seed,
            outcome: TaskOutcome::Failure {
                error: TaskError::new(
                    TaskErrorKind::Cancelled,
                    "scheduler",
                    "run cancelled before this repeat resolved",
                ),
            },
        }
    }
}
