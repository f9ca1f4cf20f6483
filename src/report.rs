//! # Run Report
//!
//! Per-record failures never abort a run. They are collected here so a run
//! ends with a summary of what was skipped or dropped.

use crate::entity::FoldOutcome;
use crate::error::{SchemaConflict, TransformError, ValidationFailure};
use crate::mapping::MappingOutput;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Run-level accounting of rows, statements and per-record errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub rows_filtered: usize,
    pub statements_emitted: usize,
    /// Emitted statements that were new to the store.
    pub statements_added: usize,
    /// Emitted statements the store refused (single-value collisions).
    pub statements_rejected: usize,
    pub entities_folded: usize,
    pub transform_errors: Vec<TransformError>,
    pub validation_failures: Vec<ValidationFailure>,
    pub conflicts: Vec<SchemaConflict>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(output: &MappingOutput) -> Self {
        Self {
            rows_read: output.rows_read,
            rows_skipped: output.rows_skipped,
            rows_filtered: output.rows_filtered,
            statements_emitted: output.statements.len(),
            transform_errors: output.errors.clone(),
            cancelled: output.cancelled,
            ..Self::default()
        }
    }

    /// Account for folded entities: their dropped values and schema conflicts.
    pub fn record_folds<'a, I>(&mut self, outcomes: I)
    where
        I: IntoIterator<Item = &'a FoldOutcome>,
    {
        for outcome in outcomes {
            self.entities_folded += 1;
            self.validation_failures
                .extend(outcome.failures.iter().cloned());
            if let Err(conflict) = &outcome.entity {
                self.conflicts.push(conflict.clone());
            }
        }
    }

    /// Combine with the report of another run or batch.
    pub fn merge(&mut self, other: RunReport) {
        self.rows_read += other.rows_read;
        self.rows_skipped += other.rows_skipped;
        self.rows_filtered += other.rows_filtered;
        self.statements_emitted += other.statements_emitted;
        self.statements_added += other.statements_added;
        self.statements_rejected += other.statements_rejected;
        self.entities_folded += other.entities_folded;
        self.transform_errors.extend(other.transform_errors);
        self.validation_failures.extend(other.validation_failures);
        self.conflicts.extend(other.conflicts);
        self.cancelled |= other.cancelled;
    }

    /// Values dropped without losing their row or entity.
    pub fn values_dropped(&self) -> usize {
        self.transform_errors
            .iter()
            .filter(|error| !error.skips_row())
            .count()
            + self.validation_failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.transform_errors.is_empty()
            && self.validation_failures.is_empty()
            && self.conflicts.is_empty()
            && self.statements_rejected == 0
            && !self.cancelled
    }

    /// Emit the summary through `tracing`.
    pub fn log_summary(&self) {
        if self.is_clean() {
            info!(
                rows = self.rows_read,
                statements = self.statements_emitted,
                entities = self.entities_folded,
                "run completed cleanly"
            );
        } else {
            warn!(
                rows = self.rows_read,
                rows_skipped = self.rows_skipped,
                values_dropped = self.values_dropped(),
                conflicts = self.conflicts.len(),
                cancelled = self.cancelled,
                "run completed with errors"
            );
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "rows: {} read, {} skipped, {} filtered",
            self.rows_read, self.rows_skipped, self.rows_filtered
        )?;
        writeln!(
            f,
            "statements: {} emitted, {} new, {} rejected",
            self.statements_emitted, self.statements_added, self.statements_rejected
        )?;
        writeln!(
            f,
            "entities: {} folded, {} conflicted",
            self.entities_folded,
            self.conflicts.len()
        )?;
        write!(f, "values dropped: {}", self.values_dropped())?;
        if self.cancelled {
            write!(f, "\nrun was cancelled")?;
        }
        for error in self.transform_errors.iter().filter(|e| e.skips_row()) {
            write!(f, "\n  skipped: {error}")?;
        }
        for conflict in &self.conflicts {
            write!(f, "\n  conflict: {conflict}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureReason, TransformErrorKind};

    fn unparseable(row: usize) -> TransformError {
        TransformError {
            row,
            entity: "person".into(),
            property: Some("birthDate".into()),
            kind: TransformErrorKind::Unparseable {
                value: "not-a-date".into(),
                type_name: "date".into(),
            },
        }
    }

    #[test]
    fn test_merge_and_counts() {
        let mut report = RunReport {
            rows_read: 2,
            transform_errors: vec![unparseable(0)],
            ..RunReport::default()
        };
        report.merge(RunReport {
            rows_read: 3,
            rows_skipped: 1,
            validation_failures: vec![ValidationFailure {
                entity_id: "e1".into(),
                property: "email".into(),
                value: "nope".into(),
                reason: FailureReason::InvalidValue,
            }],
            ..RunReport::default()
        });
        assert_eq!(report.rows_read, 5);
        assert_eq!(report.values_dropped(), 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_summary_lists_conflicts() {
        let report = RunReport {
            conflicts: vec![SchemaConflict {
                entity_id: "e1".into(),
                schemata: vec!["Company".into(), "Person".into()],
            }],
            ..RunReport::default()
        };
        let text = report.to_string();
        assert!(text.contains("1 conflicted"));
        assert!(text.contains("e1: no common schema for [Company, Person]"));
    }
}
