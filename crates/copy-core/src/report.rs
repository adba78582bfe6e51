//! Per-table outcomes and their aggregation into a run report.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::TableName;

/// Terminal state of one table pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyOutcome {
    Copied,
    SkippedUnchanged,
    FailedValidation,
    FailedCopy,
}

impl CopyOutcome {
    pub fn is_failure(self) -> bool {
        matches!(self, CopyOutcome::FailedValidation | CopyOutcome::FailedCopy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CopyOutcome::Copied => "copied",
            CopyOutcome::SkippedUnchanged => "skipped",
            CopyOutcome::FailedValidation => "invalid",
            CopyOutcome::FailedCopy => "failed",
        }
    }
}

impl fmt::Display for CopyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome sets of a run.
///
/// Recording is commutative: results arrive in completion order, and the
/// report only ever holds sets, so any order yields the same report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub copied: BTreeSet<TableName>,
    pub skipped: BTreeSet<TableName>,
    pub invalid: BTreeSet<TableName>,
    pub failed: BTreeSet<TableName>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `table` its outcome. A table already present in any set keeps
    /// its first outcome and `false` is returned.
    pub fn record(&mut self, table: TableName, outcome: CopyOutcome) -> bool {
        if self.outcome_of(&table).is_some() {
            return false;
        }
        self.bucket_mut(outcome).insert(table)
    }

    pub fn outcome_of(&self, table: &TableName) -> Option<CopyOutcome> {
        [
            CopyOutcome::Copied,
            CopyOutcome::SkippedUnchanged,
            CopyOutcome::FailedValidation,
            CopyOutcome::FailedCopy,
        ]
        .into_iter()
        .find(|outcome| self.bucket(*outcome).contains(table))
    }

    pub fn bucket(&self, outcome: CopyOutcome) -> &BTreeSet<TableName> {
        match outcome {
            CopyOutcome::Copied => &self.copied,
            CopyOutcome::SkippedUnchanged => &self.skipped,
            CopyOutcome::FailedValidation => &self.invalid,
            CopyOutcome::FailedCopy => &self.failed,
        }
    }

    fn bucket_mut(&mut self, outcome: CopyOutcome) -> &mut BTreeSet<TableName> {
        match outcome {
            CopyOutcome::Copied => &mut self.copied,
            CopyOutcome::SkippedUnchanged => &mut self.skipped,
            CopyOutcome::FailedValidation => &mut self.invalid,
            CopyOutcome::FailedCopy => &mut self.failed,
        }
    }

    pub fn len(&self) -> usize {
        self.copied.len() + self.skipped.len() + self.invalid.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_success(&self) -> bool {
        self.invalid.is_empty() && self.failed.is_empty()
    }

    /// Process exit status: 0 when every table was copied or skipped.
    pub fn status(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}
