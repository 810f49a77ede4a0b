use crate::core::discovery::StructureRef;
use crate::engine::config::{ConfigError, RunConfig, SeedMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One unit of work: a single stochastic pipeline run for one structure.
/// Uniquely keyed by (structure id, repeat index); immutable once generated.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub structure: StructureRef,
    pub repeat_index: u32,
    pub ph: f64,
    pub seed: Option<u64>,
}

/// The four developability descriptors produced by one successful repeat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub hydrophobic_area: f64,
    pub positive_area: f64,
    pub negative_area: f64,
    pub charge_asymmetry: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// The external tool could not be launched or exited abnormally.
    Tool,
    NonConvergence,
    MalformedStructure,
    Timeout,
    Cancelled,
}

impl fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskErrorKind::Tool => "tool",
            TaskErrorKind::NonConvergence => "non-convergence",
            TaskErrorKind::MalformedStructure => "malformed-structure",
            TaskErrorKind::Timeout => "timeout",
            TaskErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A typed per-task failure. Recorded inside the run result as data; task
/// failures never abort sibling tasks or the run itself.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind} failure in stage '{stage}': {message}")]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub stage: String,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: TaskErrorKind, stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// The terminal result of exactly one task. Produced exactly once per task,
/// regardless of success, failure, timeout, or cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success {
        #[serde(flatten)]
        metrics: TaskMetrics,
    },
    Failure {
        #[serde(flatten)]
        error: TaskError,
    },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }

    pub fn metrics(&self) -> Option<&TaskMetrics> {
        match self {
            TaskOutcome::Success { metrics } => Some(metrics),
            TaskOutcome::Failure { .. } => None,
        }
    }
}

/// Enumerates the cartesian product of structures × repeats, structures in
/// discovery order and repeat indices ascending, so task generation is
/// deterministic for a given input set.
pub fn generate_tasks(
    structures: &[StructureRef],
    config: &RunConfig,
) -> Result<Vec<Task>, ConfigError> {
    if config.repeats == 0 {
        return Err(ConfigError::InvalidParameter {
            name: "repeats",
            reason: "must be at least 1".to_string(),
        });
    }

    let mut tasks = Vec::with_capacity(structures.len() * config.repeats as usize);
    for structure in structures {
        for repeat_index in 0..config.repeats {
            let seed = match config.seed_mode {
                SeedMode::Fresh => None,
                SeedMode::Fixed(base) => Some(base + u64::from(repeat_index)),
            };
            tasks.push(Task {
                structure: structure.clone(),
                repeat_index,
                ph: config.ph,
                seed,
            });
        }
    }
    Ok(tasks)
}
