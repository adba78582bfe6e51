//! Run-level coordination: one pipeline per table, bounded parallelism.
//!
//! Tables are pulled from a shared queue by `workers` tasks. Each pipeline
//! opens its own pair of store connections, so no state is shared between
//! tables beyond the read-only [`CopyOptions`] and the transfer mechanism.
//! Outcomes flow back over a channel and are folded into the [`RunReport`]
//! as they arrive.

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info, info_span, Instrument};

use crate::{
    CopyOptions, CopyOutcome, RemoteFileTransfer, RunReport, StoreConnector, TableCopier,
    TableName,
};

pub struct RunCoordinator<S, T, X> {
    source: Arc<S>,
    target: Arc<T>,
    transfer: Arc<X>,
    options: Arc<CopyOptions>,
}

impl<S, T, X> Clone for RunCoordinator<S, T, X> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            target: Arc::clone(&self.target),
            transfer: Arc::clone(&self.transfer),
            options: Arc::clone(&self.options),
        }
    }
}

impl<S, T, X> RunCoordinator<S, T, X>
where
    S: StoreConnector + 'static,
    T: StoreConnector + 'static,
    X: RemoteFileTransfer + 'static,
{
    pub fn new(source: S, target: T, transfer: X, options: CopyOptions) -> Self {
        Self {
            source: Arc::new(source),
            target: Arc::new(target),
            transfer: Arc::new(transfer),
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &CopyOptions {
        &self.options
    }

    /// Copy every table in `tables` and report the outcome of each.
    ///
    /// Duplicate names are processed once. `workers` is clamped to
    /// `1..=tables.len()`; a single worker processes the tables in order on
    /// the calling task. Each table appears in exactly one set of the
    /// returned report.
    pub async fn run(&self, tables: Vec<TableName>, workers: usize) -> RunReport {
        let tables = dedupe_tables(tables);
        let mut report = RunReport::new();
        if tables.is_empty() {
            return report;
        }

        let workers = workers.clamp(1, tables.len());
        info!(
            "Copying {} table(s) from {} to {} with {} worker(s)",
            tables.len(),
            self.source.describe(),
            self.target.describe(),
            workers
        );

        if workers == 1 {
            for table in tables {
                let outcome = self.copy_table(&table).await;
                report.record(table, outcome);
            }
            return report;
        }

        self.run_parallel(&tables, workers, &mut report).await;

        // A worker that died mid-table never reported back.
        for table in tables {
            if report.outcome_of(&table).is_none() {
                error!("No outcome recorded for table {}, marking it failed", table);
                report.record(table, CopyOutcome::FailedCopy);
            }
        }
        report
    }

    async fn run_parallel(&self, tables: &[TableName], workers: usize, report: &mut RunReport) {
        let queue = Arc::new(Mutex::new(tables.iter().cloned().collect::<VecDeque<_>>()));
        let (tx, mut rx) = mpsc::unbounded_channel::<(TableName, CopyOutcome)>();

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let coordinator = self.clone();
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            pool.spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(table) = next else {
                        break;
                    };
                    let outcome = coordinator.copy_table(&table).await;
                    if tx.send((table, outcome)).is_err() {
                        break;
                    }
                }
                tracing::debug!("Worker {} finished", worker);
            });
        }
        drop(tx);

        while let Some((table, outcome)) = rx.recv().await {
            if !report.record(table.clone(), outcome) {
                error!("Duplicate outcome for table {} ignored", table);
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!("Copy worker terminated abnormally: {}", e);
            }
        }
    }

    /// Run one table pipeline on fresh connections. Never fails: connection
    /// errors and panics both end the table as [`CopyOutcome::FailedCopy`].
    async fn copy_table(&self, table: &TableName) -> CopyOutcome {
        let pipeline = async {
            let mut source = match self.source.connect().await {
                Ok(store) => store,
                Err(e) => {
                    error!(
                        "Unable to connect to source {} for table {}: {e:#}",
                        self.source.describe(),
                        table
                    );
                    return CopyOutcome::FailedCopy;
                }
            };
            let mut target = match self.target.connect().await {
                Ok(store) => store,
                Err(e) => {
                    error!(
                        "Unable to connect to target {} for table {}: {e:#}",
                        self.target.describe(),
                        table
                    );
                    return CopyOutcome::FailedCopy;
                }
            };
            TableCopier::new(&mut source, &mut target, &*self.transfer, &*self.options)
                .run(table)
                .await
        };

        match AssertUnwindSafe(pipeline)
            .catch_unwind()
            .instrument(info_span!("table", name = %table))
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!(
                    "Failed copy of table {}: pipeline panicked: {}",
                    table,
                    panic_message(payload.as_ref())
                );
                CopyOutcome::FailedCopy
            }
        }
    }
}

/// Drop repeated table names, keeping the first occurrence of each.
pub fn dedupe_tables(tables: Vec<TableName>) -> Vec<TableName> {
    let mut seen = HashSet::new();
    tables
        .into_iter()
        .filter(|table| seen.insert(table.clone()))
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, MemoryTable, MemoryTransfer, StoreOp};

    fn options(dump_dir: &std::path::Path) -> CopyOptions {
        CopyOptions {
            dump_dir: dump_dir.to_path_buf(),
            ..CopyOptions::default()
        }
    }

    fn rows(range: std::ops::Range<u32>) -> MemoryTable {
        MemoryTable::hashed().with_hashes(range.map(|i| i.to_string()))
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let tables = dedupe_tables(vec!["b".into(), "a".into(), "b".into()]);
        assert_eq!(tables, vec![TableName::new("b"), TableName::new("a")]);
    }

    #[tokio::test]
    async fn test_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = RunCoordinator::new(
            MemoryStore::new("localhost").connector(),
            MemoryStore::new("localhost").connector(),
            MemoryTransfer::default(),
            options(dir.path()),
        );
        let report = coordinator.run(Vec::new(), 4).await;
        assert!(report.is_empty());
        assert_eq!(report.status(), 0);
    }

    #[tokio::test]
    async fn test_panicking_pipeline_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemoryStore::new("localhost")
            .with_table("a", rows(0..5))
            .with_table("b", rows(0..5));
        source.panic_on("a", StoreOp::Export);
        let target = MemoryStore::new("localhost");

        let coordinator = RunCoordinator::new(
            source.connector(),
            target.connector(),
            MemoryTransfer::default(),
            options(dir.path()),
        );
        let report = coordinator.run(vec!["a".into(), "b".into()], 2).await;

        assert_eq!(report.outcome_of(&"a".into()), Some(CopyOutcome::FailedCopy));
        assert_eq!(report.outcome_of(&"b".into()), Some(CopyOutcome::Copied));
        assert_eq!(report.len(), 2);
    }

    #[tokio::test]
    async fn test_connection_failure_fails_table() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemoryStore::new("localhost").with_table("a", rows(0..5));
        let target = MemoryStore::new("localhost");

        let coordinator = RunCoordinator::new(
            source.connector(),
            target.connector().refusing(),
            MemoryTransfer::default(),
            options(dir.path()),
        );
        let report = coordinator.run(vec!["a".into()], 1).await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.status(), 1);
    }
}
