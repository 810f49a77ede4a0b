use crate::core::discovery::StructureRef;
use crate::engine::aggregate::{
    AggregateStatus, RepeatRecord, RunMetadata, RunResult, StructureAggregate, summarize_records,
};
use crate::engine::scheduler::CompletedTask;
use crate::engine::task::{TaskErrorKind, TaskOutcome};
use std::collections::BTreeMap;
use tracing::debug;

struct PartialAggregate {
    source: std::path::PathBuf,
    records: Vec<RepeatRecord>,
}

/// Folds completed tasks into per-structure record sets, in whatever order
/// the scheduler delivers them. Entries are created lazily on the first
/// outcome for a structure; the fold is keyed by repeat index, so the final
/// aggregate is independent of arrival order.
pub struct Collector {
    expected_repeats: u32,
    discovered: Vec<StructureRef>,
    partials: BTreeMap<String, PartialAggregate>,
}

impl Collector {
    pub fn new(structures: &[StructureRef], expected_repeats: u32) -> Self {
        Self {
            expected_repeats,
            discovered: structures.to_vec(),
            partials: BTreeMap::new(),
        }
    }

    /// Applies one completed task to its structure's aggregate. Returns
    /// `true` when this outcome was the structure's last expected repeat.
    pub fn record(&mut self, done: CompletedTask) -> bool {
        let source = self
            .discovered
            .iter()
            .find(|s| s.id == done.structure_id)
            .map(|s| s.path.clone())
            .unwrap_or_default();

        let expected = self.expected_repeats;
        let entry = self
            .partials
            .entry(done.structure_id.clone())
            .or_insert_with(|| PartialAggregate {
                source,
                records: Vec::with_capacity(expected as usize),
            });

        debug_assert!(
            !entry
                .records
                .iter()
                .any(|r| r.repeat_index == done.repeat_index),
            "duplicate outcome for {}#{}",
            done.structure_id,
            done.repeat_index
        );

        entry.records.push(RepeatRecord {
            repeat_index: done.repeat_index,
            seed: done.seed,
            outcome: done.outcome,
        });

        let complete = entry.records.len() as u32 == expected;
        if complete {
            debug!(structure = %done.structure_id, "All repeats resolved");
        }
        complete
    }

    /// Count of structures with every repeat resolved.
    pub fn completed_structures(&self) -> usize {
        self.partials
            .values()
            .filter(|p| p.records.len() as u32 == self.expected_repeats)
            .count()
    }

    /// Finalizes every aggregate into an immutable run result. Structures
    /// with unresolved repeats are flagged `Partial`, never omitted; this
    /// includes structures that received no outcome at all.
    pub fn finalize(mut self, metadata: RunMetadata) -> RunResult {
        let mut structures = BTreeMap::new();

        for structure in &self.discovered {
            let partial = self
                .partials
                .remove(&structure.id)
                .unwrap_or_else(|| PartialAggregate {
                    source: structure.path.clone(),
                    records: Vec::new(),
                });

            let mut records = partial.records;
            records.sort_by_key(|r| r.repeat_index);

            // A cancelled repeat fills its slot with a terminal outcome but
            // the structure still never genuinely resolved.
            let resolved = records.len() as u32 == self.expected_repeats;
            let cancelled = records.iter().any(|r| {
                matches!(
                    &r.outcome,
                    TaskOutcome::Failure { error } if error.kind == TaskErrorKind::Cancelled
                )
            });
            let status = if resolved && !cancelled {
                AggregateStatus::Complete
            } else {
                AggregateStatus::Partial
            };
            let summary = summarize_records(&records);

            structures.insert(
                structure.id.clone(),
                StructureAggregate {
                    source: partial.source,
                    repeats_requested: self.expected_repeats,
                    status,
                    repeats: records,
                    summary,
                },
            );
        }

        RunResult {
            metadata,
            structures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::task::{TaskError, TaskErrorKind, TaskMetrics, TaskOutcome};
    use std::path::PathBuf;

    fn structure(id: &str) -> StructureRef {
        StructureRef {
            id: id.to_string(),
            path: PathBuf::from(format!("/data/{id}.pdb")),
            heavy_chain: 'H',
            light_chain: 'L',
        }
    }

    fn completed(id: &str, repeat_index: u32, value: Option<f64>) -> CompletedTask {
        let outcome = match value {
            Some(v) => TaskOutcome::Success {
                metrics: TaskMetrics {
                    hydrophobic_area: v,
                    positive_area: v * 2.0,
                    negative_area: v * 3.0,
                    charge_asymmetry: -v,
                },
            },
            None => TaskOutcome::Failure {
                error: TaskError::new(TaskErrorKind::Tool, "pipeline", "driver crashed"),
            },
        };
        CompletedTask {
            structure_id: id.to_string(),
            repeat_index,
            seed: None,
            outcome,
        }
    }

    fn metadata() -> RunMetadata {
        RunMetadata {
            repeats: 2,
            ph: 7.0,
            wall_time_secs: 0.0,
        }
    }

    #[test]
    fn outcomes_are_routed_by_structure() {
        let structures = vec![structure("a"), structure("b")];
        let mut collector = Collector::new(&structures, 2);

        assert!(!collector.record(completed("a", 0, Some(1.0))));
        assert!(!collector.record(completed("b", 0, Some(5.0))));
        assert!(collector.record(completed("a", 1, Some(3.0))));
        assert_eq!(collector.completed_structures(), 1);
        assert!(collector.record(completed("b", 1, None)));

        let result = collector.finalize(metadata());
        assert_eq!(result.structures.len(), 2);
        assert_eq!(result.structures["a"].summary.successes, 2);
        assert_eq!(result.structures["a"].summary.hydrophobic_area.unwrap().mean, 2.0);
        assert_eq!(result.structures["b"].summary.failures, 1);
    }

    #[test]
    fn final_aggregate_is_order_independent() {
        let structures = vec![structure("a"), structure("b")];
        let outcomes = vec![
            completed("a", 0, Some(1.0)),
            completed("a", 1, Some(2.0)),
            completed("b", 0, None),
            completed("b", 1, Some(9.0)),
        ];

        // Interleavings across structures and repeats, including reversed.
        let permutations: Vec<Vec<usize>> = vec![
            vec![0, 1, 2, 3],
            vec![3, 2, 1, 0],
            vec![2, 0, 3, 1],
            vec![1, 3, 0, 2],
        ];

        let mut results = Vec::new();
        for perm in permutations {
            let mut collector = Collector::new(&structures, 2);
            for &i in &perm {
                collector.record(outcomes[i].clone());
            }
            results.push(collector.finalize(metadata()));
        }

        for other in &results[1..] {
            assert_eq!(&results[0], other);
        }
    }

    #[test]
    fn structure_with_no_outcomes_is_flagged_partial() {
        let structures = vec![structure("seen"), structure("never_ran")];
        let mut collector = Collector::new(&structures, 2);
        collector.record(completed("seen", 0, Some(1.0)));

        let result = collector.finalize(metadata());

        let seen = &result.structures["seen"];
        assert_eq!(seen.status, AggregateStatus::Partial);
        assert_eq!(seen.repeats.len(), 1);

        let never = &result.structures["never_ran"];
        assert_eq!(never.status, AggregateStatus::Partial);
        assert!(never.repeats.is_empty());
        assert_eq!(never.summary.successes, 0);
        assert!(never.summary.hydrophobic_area.is_none());
        assert_eq!(never.source, PathBuf::from("/data/never_ran.pdb"));
    }

    #[test]
    fn cancelled_repeats_leave_the_structure_partial() {
        let structures = vec![structure("a")];
        let mut collector = Collector::new(&structures, 2);
        collector.record(completed("a", 0, Some(1.0)));
        collector.record(CompletedTask {
            structure_id: "a".to_string(),
            repeat_index: 1,
            seed: None,
            outcome: TaskOutcome::Failure {
                error: TaskError::new(
                    TaskErrorKind::Cancelled,
                    "scheduler",
                    "run cancelled before this repeat resolved",
                ),
            },
        });

        let result = collector.finalize(metadata());

        let aggregate = &result.structures["a"];
        assert_eq!(aggregate.repeats.len(), 2);
        assert_eq!(aggregate.status, AggregateStatus::Partial);
    }

    #[test]
    fn records_are_listed_in_repeat_order_regardless_of_arrival() {
        let structures = vec![structure("a")];
        let mut collector = Collector::new(&structures, 3);
        collector.record(completed("a", 2, Some(3.0)));
        collector.record(completed("a", 0, Some(1.0)));
        collector.record(completed("a", 1, None));

        let result = collector.finalize(RunMetadata {
            repeats: 3,
            ph: 7.0,
            wall_time_secs: 0.0,
        });

        let indices: Vec<u32> = result.structures["a"]
            .repeats
            .iter()
            .map(|r| r.repeat_index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(result.structures["a"].status, AggregateStatus::Complete);
    }
}
