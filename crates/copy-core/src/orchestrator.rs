//! Per-table copy state machine.
//!
//! ```text
//! Start → Validating ─┬─ invalid ──────────────→ FailedValidation
//!                     └→ Deciding ─┬─ unchanged → SkippedUnchanged
//!                                  └→ Incremental ─┬─ ok ───→ Copied
//!                                                  └→ Full ─┬─ ok → Copied
//!                                                           └─────→ FailedCopy
//! ```
//!
//! Exactly one terminal state is reached per table and nothing is retried
//! within a run.

use std::fmt;

use tracing::{error, info, warn};

use crate::consistency::{check_validity, last_modified_matches, schemas_match};
use crate::full::copy_full;
use crate::incremental::sync_incremental;
use crate::{CopyError, CopyOptions, CopyOutcome, DataStore, RemoteFileTransfer, TableName};

/// Pipeline stage, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Deciding,
    Incremental,
    Full,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Deciding => "deciding",
            Stage::Incremental => "incremental",
            Stage::Full => "full",
        };
        f.write_str(name)
    }
}

struct StageFailure {
    stage: Stage,
    error: CopyError,
}

fn at(stage: Stage) -> impl FnOnce(CopyError) -> StageFailure {
    move |error| StageFailure { stage, error }
}

/// Runs the copy pipeline of one table over a dedicated pair of stores.
pub struct TableCopier<'a, S: ?Sized, T: ?Sized, X: ?Sized> {
    source: &'a mut S,
    target: &'a mut T,
    transfer: &'a X,
    options: &'a CopyOptions,
}

impl<'a, S, T, X> TableCopier<'a, S, T, X>
where
    S: DataStore + ?Sized,
    T: DataStore + ?Sized,
    X: RemoteFileTransfer + ?Sized,
{
    pub fn new(
        source: &'a mut S,
        target: &'a mut T,
        transfer: &'a X,
        options: &'a CopyOptions,
    ) -> Self {
        Self {
            source,
            target,
            transfer,
            options,
        }
    }

    /// Drive `table` to its terminal state. Store faults are logged here and
    /// reported as [`CopyOutcome::FailedCopy`].
    pub async fn run(&mut self, table: &TableName) -> CopyOutcome {
        match self.advance(table).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                error!(
                    table = %table,
                    stage = %failure.stage,
                    "Failed copy of table {}: {:#}",
                    table,
                    failure.error
                );
                CopyOutcome::FailedCopy
            }
        }
    }

    async fn advance(&mut self, table: &TableName) -> Result<CopyOutcome, StageFailure> {
        if self.options.verifies(table) {
            let verdict = check_validity(
                table,
                &mut *self.source,
                &mut *self.target,
                self.options.verify_threshold,
            )
            .await
            .map_err(|e| at(Stage::Validating)(e.into()))?;
            if !verdict.is_valid() {
                return Ok(CopyOutcome::FailedValidation);
            }
        }

        if self
            .unchanged(table)
            .await
            .map_err(|e| at(Stage::Deciding)(e.into()))?
        {
            info!(
                "Skipping copying of table {} (source/target have same row count and last mod date)",
                table
            );
            return Ok(CopyOutcome::SkippedUnchanged);
        }

        if !self.options.force_full {
            info!(
                "Starting incremental copy of table {} from {}({}) to {}({})",
                table,
                self.source.database(),
                self.source.host(),
                self.target.database(),
                self.target.host()
            );
            match sync_incremental(
                table,
                &mut *self.source,
                &mut *self.target,
                self.transfer,
                self.options,
            )
            .await
            {
                Ok(_) => {
                    info!("Successful incremental copy of table {}", table);
                    return Ok(CopyOutcome::Copied);
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Failed incremental copy of table {}: {}", table, e);
                }
                Err(e) => return Err(at(Stage::Incremental)(e)),
            }
        }

        info!(
            "Starting full copy of table {} from {}({}) to {}({})",
            table,
            self.source.database(),
            self.source.host(),
            self.target.database(),
            self.target.host()
        );
        copy_full(
            table,
            &mut *self.source,
            &mut *self.target,
            self.transfer,
            self.options,
        )
        .await
        .map_err(at(Stage::Full))?;
        info!("Successful full copy of table {}", table);
        Ok(CopyOutcome::Copied)
    }

    /// The skip rule: the last-modified check is enabled, the target exists,
    /// structures match with keys, and row counts plus last-modified agree.
    ///
    /// Disabling the last-modified check therefore always forces a copy,
    /// even when nothing changed.
    async fn unchanged(&mut self, table: &TableName) -> anyhow::Result<bool> {
        if self.options.no_last_mod_check {
            return Ok(false);
        }
        if !self.target.table_exists(table).await? {
            return Ok(false);
        }
        if !schemas_match(table, &mut *self.source, &mut *self.target, true).await? {
            return Ok(false);
        }
        last_modified_matches(table, &mut *self.source, &mut *self.target).await
    }
}
