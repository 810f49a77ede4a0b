use crate::core::stats::{self, MetricSummary};
use crate::engine::task::TaskOutcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Whether every requested repeat of a structure resolved to an outcome, or
/// the run ended (cancellation) with repeats still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    Complete,
    Partial,
}

/// One resolved repeat of one structure, as listed in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatRecord {
    pub repeat_index: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub seed: Option<u64>,
    #[serde(flatten)]
    pub outcome: TaskOutcome,
}

/// Per-structure summary statistics over successful repeats only. All metric
/// summaries are `None` when no repeat succeeded, so consumers can tell
/// "no data" apart from a value that is exactly zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub successes: u32,
    pub failures: u32,
    pub hydrophobic_area: Option<MetricSummary>,
    pub positive_area: Option<MetricSummary>,
    pub negative_area: Option<MetricSummary>,
    pub charge_asymmetry: Option<MetricSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureAggregate {
    pub source: PathBuf,
    pub repeats_requested: u32,
    pub status: AggregateStatus,
    pub repeats: Vec<RepeatRecord>,
    pub summary: AggregateSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub repeats: u32,
    pub ph: f64,
    pub wall_time_secs: f64,
}

/// The sole output of a run: every discovered structure keyed by id, in
/// sorted order, plus run-level metadata. Immutable once finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub metadata: RunMetadata,
    pub structures: BTreeMap<String, StructureAggregate>,
}

/// Computes summary statistics from a finished record set. A pure fold over
/// the outcomes, so the result is independent of arrival order.
pub fn summarize_records(records: &[RepeatRecord]) -> AggregateSummary {
    let mut hydrophobic = Vec::new();
    let mut positive = Vec::new();
    let mut negative = Vec::new();
    let mut asymmetry = Vec::new();
    let mut failures = 0u32;

    for record in records {
        match record.outcome.metrics() {
            Some(m) => {
                hydrophobic.push(m.hydrophobic_area);
                positive.push(m.positive_area);
                negative.push(m.negative_area);
                asymmetry.push(m.charge_asymmetry);
            }
            None => failures += 1,
        }
    }

    AggregateSummary {
        successes: hydrophobic.len() as u32,
        failures,
        hydrophobic_area: stats::summarize(&hydrophobic),
        positive_area: stats::summarize(&positive),
        negative_area: stats::summarize(&negative),
        charge_asymmetry: stats::summarize(&asymmetry),
    }
}
