use crate::engine::config::ConfigError;
use crate::engine::task::{Task, TaskError, TaskErrorKind, TaskMetrics};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// The boundary to the external feature pipeline: renumbering, protonation at
/// the requested pH, minimization, electrostatics, and patch extraction all
/// happen behind this single fallible operation. The core never inspects or
/// retries its internals.
#[async_trait]
pub trait FeaturePipeline: Send + Sync {
    async fn run(&self, task: &Task) -> Result<TaskMetrics, TaskError>;
}

/// Paths to the external driver, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Driver executable. A bare program name is resolved through `PATH` at
    /// spawn time; an explicit path must exist.
    pub driver: PathBuf,
    /// Auxiliary data directory forwarded to the driver, if it needs one.
    pub data_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_explicit_path(&self.driver) && !self.driver.is_file() {
            return Err(ConfigError::InvalidParameter {
                name: "driver",
                reason: format!("executable '{}' does not exist", self.driver.display()),
            });
        }
        if let Some(dir) = &self.data_dir {
            if !dir.is_dir() {
                return Err(ConfigError::InvalidParameter {
                    name: "data_dir",
                    reason: format!("'{}' is not a directory", dir.display()),
                });
            }
        }
        Ok(())
    }
}

fn is_explicit_path(path: &Path) -> bool {
    path.components().count() > 1
}

/// Runs each task as one invocation of the configured driver executable.
///
/// Driver contract: on success, exit 0 with the four metrics as a JSON object
/// on stdout; on a controlled failure, non-zero exit with a JSON
/// `{kind, stage, message}` object on stdout. Anything else is reported as a
/// tool error with a stderr excerpt.
pub struct ExternalPipeline {
    config: PipelineConfig,
}

impl ExternalPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

#[async_trait]
impl FeaturePipeline for ExternalPipeline {
    async fn run(&self, task: &Task) -> Result<TaskMetrics, TaskError> {
        let mut cmd = Command::new(&self.config.driver);
        cmd.arg(&task.structure.path)
            .arg("--heavy-chain")
            .arg(task.structure.heavy_chain.to_string())
            .arg("--light-chain")
            .arg(task.structure.light_chain.to_string())
            .arg("--ph")
            .arg(task.ph.to_string());
        if let Some(seed) = task.seed {
            cmd.arg("--seed").arg(seed.to_string());
        }
        if let Some(dir) = &self.config.data_dir {
            cmd.arg("--data-dir").arg(dir);
        }
        // Reap the driver if this future is dropped by a timeout or abort.
        cmd.kill_on_drop(true);

        debug!(
            structure = %task.structure.id,
            repeat = task.repeat_index,
            "Invoking feature pipeline driver"
        );

        let output = cmd.output().await.map_err(|e| {
            TaskError::new(
                TaskErrorKind::Tool,
                "invoke",
                format!("failed to launch '{}': {e}", self.config.driver.display()),
            )
        })?;

        if output.status.success() {
            parse_metrics(&output.stdout)
        } else {
            Err(parse_failure(&output.stdout, &output.stderr))
        }
    }
}

fn parse_metrics(stdout: &[u8]) -> Result<TaskMetrics, TaskError> {
    serde_json::from_slice(stdout).map_err(|e| {
        TaskError::new(
            TaskErrorKind::Tool,
            "parse",
            format!("driver produced unparseable metrics: {e}"),
        )
    })
}

fn parse_failure(stdout: &[u8], stderr: &[u8]) -> TaskError {
    #[derive(Deserialize)]
    struct DriverFailure {
        kind: TaskErrorKind,
        stage: String,
        message: String,
    }

    if let Ok(failure) = serde_json::from_slice::<DriverFailure>(stdout) {
        return TaskError::new(failure.kind, failure.stage, failure.message);
    }

    let stderr = String::from_utf8_lossy(stderr);
    let excerpt: String = stderr.trim().chars().take(500).collect();
    TaskError::new(
        TaskErrorKind::Tool,
        "pipeline",
        if excerpt.is_empty() {
            "driver exited with non-zero status".to_string()
        } else {
            excerpt
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::discovery::StructureRef;
    use std::fs::File;

    fn task_for(path: PathBuf) -> Task {
        Task {
            structure: StructureRef::from_path(path),
            repeat_index: 0,
            ph: 7.0,
            seed: None,
        }
    }

    #[test]
    fn explicit_missing_driver_path_fails_validation() {
        let config = PipelineConfig {
            driver: PathBuf::from("/nonexistent/bin/abprof-driver"),
            data_dir: None,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "driver", .. })
        ));
    }

    #[test]
    fn bare_driver_name_defers_to_path_resolution() {
        let config = PipelineConfig {
            driver: PathBuf::from("abprof-driver"),
            data_dir: None,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_data_dir_fails_validation() {
        let config = PipelineConfig {
            driver: PathBuf::from("abprof-driver"),
            data_dir: Some(PathBuf::from("/nonexistent/abprof-data")),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "data_dir", .. })
        ));
    }

    #[test]
    fn metrics_parse_round_trip() {
        let stdout = br#"{
            "hydrophobic_area": 101.5,
            "positive_area": 20.0,
            "negative_area": 33.0,
            "charge_asymmetry": -0.75
        }"#;
        let metrics = parse_metrics(stdout).unwrap();
        assert_eq!(metrics.hydrophobic_area, 101.5);
        assert_eq!(metrics.charge_asymmetry, -0.75);
    }

    #[test]
    fn unparseable_metrics_become_tool_error() {
        let err = parse_metrics(b"not json").unwrap_err();
        assert_eq!(err.kind, TaskErrorKind::Tool);
        assert_eq!(err.stage, "parse");
    }

    #[test]
    fn structured_driver_failure_is_preserved() {
        let stdout = br#"{"kind":"non_convergence","stage":"minimization","message":"did not converge after 5000 steps"}"#;
        let err = parse_failure(stdout, b"");
        assert_eq!(err.kind, TaskErrorKind::NonConvergence);
        assert_eq!(err.stage, "minimization");
    }

    #[test]
    fn unstructured_failure_falls_back_to_stderr_excerpt() {
        let err = parse_failure(b"", b"segmentation fault\n");
        assert_eq!(err.kind, TaskErrorKind::Tool);
        assert_eq!(err.stage, "pipeline");
        assert_eq!(err.message, "segmentation fault");
    }

    #[tokio::test]
    async fn launching_a_missing_driver_yields_invoke_error() {
        let dir = tempfile::tempdir().unwrap();
        let pdb = dir.path().join("mab.pdb");
        File::create(&pdb).unwrap();

        // Bare name passes validation but cannot be resolved at spawn time.
        let pipeline = ExternalPipeline::new(PipelineConfig {
            driver: PathBuf::from("abprof-driver-that-does-not-exist"),
            data_dir: None,
        })
        .unwrap();

        let err = pipeline.run(&task_for(pdb)).await.unwrap_err();
        assert_eq!(err.kind, TaskErrorKind::Tool);
        assert_eq!(err.stage, "invoke");
    }
}
