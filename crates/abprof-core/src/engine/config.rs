use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How per-repeat random seeds are assigned.
///
/// `Fresh` passes no seed, so the external pipeline draws its own entropy and
/// repeats are genuinely independent. `Fixed(base)` gives repeat `i` the seed
/// `base + i`, making every repeat reproducible across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    Fresh,
    Fixed(u64),
}

/// How task completions are reported to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Wait for the whole batch, then deliver every outcome at once.
    Drain,
    /// Deliver each outcome the moment it resolves, refilling the pool as
    /// slots free up. Avoids a single slow task hiding all other results.
    Incremental,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub repeats: u32,
    pub ph: f64,
    pub seed_mode: SeedMode,
    pub schedule_mode: ScheduleMode,
    pub max_concurrent: usize,
    pub task_timeout: Duration,
}

#[derive(Default)]
pub struct RunConfigBuilder {
    repeats: Option<u32>,
    ph: Option<f64>,
    seed_mode: Option<SeedMode>,
    schedule_mode: Option<ScheduleMode>,
    max_concurrent: Option<usize>,
    task_timeout: Option<Duration>,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repeats(mut self, repeats: u32) -> Self {
        self.repeats = Some(repeats);
        self
    }
    pub fn ph(mut self, ph: f64) -> Self {
        self.ph = Some(ph);
        self
    }
    pub fn seed_mode(mut self, mode: SeedMode) -> Self {
        self.seed_mode = Some(mode);
        self
    }
    pub fn schedule_mode(mut self, mode: ScheduleMode) -> Self {
        self.schedule_mode = Some(mode);
        self
    }
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = Some(max);
        self
    }
    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let repeats = self.repeats.ok_or(ConfigError::MissingParameter("repeats"))?;
        if repeats == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "repeats",
                reason: "must be at least 1".to_string(),
            });
        }

        let ph = self.ph.unwrap_or(7.0);
        if !ph.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "ph",
                reason: format!("must be a finite number, got {ph}"),
            });
        }

        let max_concurrent = self.max_concurrent.unwrap_or(1);
        if max_concurrent == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_concurrent",
                reason: "must be at least 1".to_string(),
            });
        }

        let task_timeout = self.task_timeout.unwrap_or(Duration::from_secs(1800));
        if task_timeout.is_zero() {
            return Err(ConfigError::InvalidParameter {
                name: "task_timeout",
                reason: "must be non-zero".to_string(),
            });
        }

        Ok(RunConfig {
            repeats,
            ph,
            seed_mode: self.seed_mode.unwrap_or(SeedMode::Fresh),
            schedule_mode: self.schedule_mode.unwrap_or(ScheduleMode::Drain),
            max_concurrent,
            task_timeout,
        })
    }
}
