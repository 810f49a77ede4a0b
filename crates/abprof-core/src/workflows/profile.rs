use crate::core::discovery::StructureRef;
use crate::engine::aggregate::{RunMetadata, RunResult};
use crate::engine::collector::Collector;
use crate::engine::config::{RunConfig, ScheduleMode};
use crate::engine::error::EngineError;
use crate::engine::pipeline::FeaturePipeline;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::scheduler::{CompletedTask, WorkerPool};
use crate::engine::task::{TaskOutcome, generate_tasks};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Runs one complete profiling batch: task generation, bounded parallel
/// execution, incremental collection, and final aggregation.
///
/// Task-level failures are data inside the returned [`RunResult`]; only
/// configuration problems surface as `Err`. A cancellation signal on
/// `cancel` ends scheduling early and still yields a result with partial
/// structures flagged.
#[instrument(skip_all, name = "profile_workflow")]
pub async fn run(
    structures: Vec<StructureRef>,
    config: &RunConfig,
    pipeline: Arc<dyn FeaturePipeline>,
    reporter: &ProgressReporter<'_>,
    cancel: watch::Receiver<bool>,
) -> Result<RunResult, EngineError> {
    let start = Instant::now();

    reporter.report(Progress::PhaseStart {
        name: "Generating tasks",
    });
    let tasks = generate_tasks(&structures, config)?;
    info!(
        structures = structures.len(),
        repeats = config.repeats,
        tasks = tasks.len(),
        "Task batch generated"
    );
    reporter.report(Progress::PhaseFinish);

    let mut collector = Collector::new(&structures, config.repeats);
    let pool = WorkerPool::new(pipeline, config);

    reporter.report(Progress::BatchStart {
        total_tasks: tasks.len() as u64,
    });

    let cancel_probe = cancel.clone();
    match config.schedule_mode {
        ScheduleMode::Incremental => {
            pool.stream(tasks, cancel, |done| {
                report_completion(reporter, &done);
                collector.record(done);
            })
            .await;
        }
        ScheduleMode::Drain => {
            let batch = pool.drain(tasks, cancel).await;
            for done in batch {
                report_completion(reporter, &done);
                collector.record(done);
            }
        }
    }

    reporter.report(Progress::BatchFinish);

    if *cancel_probe.borrow() {
        warn!("Run was cancelled; aggregating partial results");
    }
    info!(
        completed_structures = collector.completed_structures(),
        "Aggregating results"
    );

    let metadata = RunMetadata {
        repeats: config.repeats,
        ph: config.ph,
        wall_time_secs: start.elapsed().as_secs_f64(),
    };
    Ok(collector.finalize(metadata))
}

fn report_completion(reporter: &ProgressReporter<'_>, done: &CompletedTask) {
    reporter.report(Progress::TaskCompleted {
        structure_id: done.structure_id.clone(),
        repeat_index: done.repeat_index,
        failed: !done.outcome.is_success(),
    });
    if let TaskOutcome::Failure { error } = &done.outcome {
        warn!(
            structure = %done.structure_id,
            repeat = done.repeat_index,
            kind = %error.kind,
            stage = %error.stage,
            "Repeat failed: {}",
            error.message
        );
    }
}
