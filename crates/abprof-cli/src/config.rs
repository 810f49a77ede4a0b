use crate::cli::Cli;
use crate::error::{CliError, Result};
use abprof::engine::config as core_config;
use abprof::engine::pipeline::PipelineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const DEFAULT_DRIVER: &str = "abprof-driver";
const DEFAULT_PH: f64 = 7.0;
const DEFAULT_TIMEOUT_SECS: u64 = 1800;

/// Everything a run needs, resolved once at startup and immutable afterwards.
pub struct AppConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub run: core_config::RunConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialPipelineConfig {
    driver: Option<PathBuf>,
    #[serde(rename = "data-dir")]
    data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialRunConfig {
    ph: Option<f64>,
    #[serde(rename = "timeout-secs")]
    timeout_secs: Option<u64>,
    jobs: Option<usize>,
    seed: Option<u64>,
}

/// The optional TOML tool-configuration file. CLI arguments override file
/// values, which override built-in defaults.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialToolConfig {
    pipeline: Option<PartialPipelineConfig>,
    run: Option<PartialRunConfig>,
}

impl PartialToolConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading tool configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn merge_with_cli(mut self, args: &Cli) -> Result<AppConfig> {
        let pipeline_file = self.pipeline.take().unwrap_or_default();
        let run_file = self.run.take().unwrap_or_default();

        let seed_mode = match args.seed.or(run_file.seed) {
            Some(base) => core_config::SeedMode::Fixed(base),
            None => core_config::SeedMode::Fresh,
        };
        let schedule_mode = if args.wait {
            core_config::ScheduleMode::Incremental
        } else {
            core_config::ScheduleMode::Drain
        };
        let timeout_secs = args
            .timeout
            .or(run_file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let run = core_config::RunConfigBuilder::new()
            .repeats(args.repeats)
            .ph(args.ph.or(run_file.ph).unwrap_or(DEFAULT_PH))
            .seed_mode(seed_mode)
            .schedule_mode(schedule_mode)
            .max_concurrent(args.jobs.or(run_file.jobs).unwrap_or_else(num_cpus::get))
            .task_timeout(Duration::from_secs(timeout_secs))
            .build()?;

        let pipeline = PipelineConfig {
            driver: pipeline_file
                .driver
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DRIVER)),
            data_dir: pipeline_file.data_dir,
        };
        pipeline.validate()?;

        validate_output_path(&args.output)?;

        Ok(AppConfig {
            input: args.input.clone(),
            output: args.output.clone(),
            run,
            pipeline,
        })
    }
}

/// The report is only written at the end of the run; an unwritable
/// destination has to surface before any task is scheduled.
fn validate_output_path(output: &Path) -> Result<()> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(CliError::Argument(format!(
            "output directory '{}' does not exist",
            parent.display()
        )));
    }

    // Opening in append mode leaves an existing report untouched while still
    // proving the destination accepts writes.
    let existed = output.exists();
    match std::fs::OpenOptions::new().create(true).append(true).open(output) {
        Ok(_) => {
            if !existed {
                let _ = std::fs::remove_file(output);
            }
            Ok(())
        }
        Err(e) => Err(CliError::Argument(format!(
            "output path '{}' is not writable: {}",
            output.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    fn parse_cli(args: &[&str]) -> Cli {
        Cli::parse_from(args)
    }

    #[test]
    fn defaults_apply_without_a_config_file() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report.json");
        let output_arg = output.to_str().unwrap();
        let cli = parse_cli(&["abprof", "structures", "-o", output_arg]);

        let config = PartialToolConfig::default().merge_with_cli(&cli).unwrap();

        assert_eq!(config.run.repeats, 1);
        assert_eq!(config.run.ph, DEFAULT_PH);
        assert_eq!(config.run.seed_mode, core_config::SeedMode::Fresh);
        assert_eq!(config.run.schedule_mode, core_config::ScheduleMode::Drain);
        assert_eq!(
            config.run.task_timeout,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
        assert_eq!(config.pipeline.driver, PathBuf::from(DEFAULT_DRIVER));
    }

    #[test]
    fn file_values_fill_in_and_cli_overrides_win() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report.json");
        let config_path = dir.path().join("tools.toml");
        fs::write(
            &config_path,
            r#"
            [pipeline]
            driver = "abprof-driver"

            [run]
            ph = 6.0
            timeout-secs = 120
            jobs = 3
            seed = 900
            "#,
        )
        .unwrap();

        let cli = parse_cli(&[
            "abprof",
            "structures",
            "-o",
            output.to_str().unwrap(),
            "--pH",
            "7.4",
            "--repeats",
            "4",
            "--wait",
        ]);

        let config = PartialToolConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&cli)
            .unwrap();

        // CLI wins where given, file fills the rest.
        assert_eq!(config.run.ph, 7.4);
        assert_eq!(config.run.repeats, 4);
        assert_eq!(
            config.run.schedule_mode,
            core_config::ScheduleMode::Incremental
        );
        assert_eq!(config.run.task_timeout, Duration::from_secs(120));
        assert_eq!(config.run.max_concurrent, 3);
        assert_eq!(config.run.seed_mode, core_config::SeedMode::Fixed(900));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("tools.toml");
        fs::write(&config_path, "[pipeline]\nexecutable = \"typo\"\n").unwrap();

        let result = PartialToolConfig::from_file(&config_path);

        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn zero_repeats_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report.json");
        let cli = parse_cli(&[
            "abprof",
            "structures",
            "-o",
            output.to_str().unwrap(),
            "--repeats",
            "0",
        ]);

        let result = PartialToolConfig::default().merge_with_cli(&cli);

        assert!(matches!(result, Err(CliError::Config(_))));
        assert!(!output.exists());
    }

    #[test]
    fn missing_output_directory_is_rejected() {
        let cli = parse_cli(&[
            "abprof",
            "structures",
            "-o",
            "/nonexistent/dir/report.json",
        ]);

        let result = PartialToolConfig::default().merge_with_cli(&cli);

        assert!(matches!(result, Err(CliError::Argument(_))));
    }

    #[test]
    fn unwritable_output_path_is_rejected() {
        let dir = tempdir().unwrap();
        // A directory at the output path: the parent exists, but the
        // destination itself can never be opened for writing.
        let output = dir.path().join("report.json");
        fs::create_dir(&output).unwrap();

        let cli = parse_cli(&["abprof", "structures", "-o", output.to_str().unwrap()]);
        let result = PartialToolConfig::default().merge_with_cli(&cli);

        assert!(matches!(result, Err(CliError::Argument(_))));
    }

    #[test]
    fn existing_report_survives_output_validation() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report.json");
        fs::write(&output, "{\"previous\": true}\n").unwrap();

        let cli = parse_cli(&["abprof", "structures", "-o", output.to_str().unwrap()]);
        PartialToolConfig::default().merge_with_cli(&cli).unwrap();

        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "{\"previous\": true}\n"
        );
    }

    #[test]
    fn explicit_missing_driver_path_fails_fast() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report.json");
        let config_path = dir.path().join("tools.toml");
        fs::write(
            &config_path,
            "[pipeline]\ndriver = \"/nonexistent/bin/abprof-driver\"\n",
        )
        .unwrap();

        let cli = parse_cli(&["abprof", "structures", "-o", output.to_str().unwrap()]);
        let result = PartialToolConfig::from_file(&config_path)
            .unwrap()
            .merge_with_cli(&cli);

        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
