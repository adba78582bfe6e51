//! Hash-based incremental synchronization.
//!
//! Every row carries a content hash. Rows whose hash exists only on the
//! target are deleted; rows whose hash exists only on the source are exported
//! and loaded. An updated row therefore shows up as one delete plus one add.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::batch::ChunkMutation;
use crate::consistency::schemas_match;
use crate::error::Result;
use crate::{
    artifact, BatchExecutor, CopyError, CopyOptions, DataStore, Precondition, RemoteFileTransfer,
    RowHash, RowHashSet, TableName,
};

/// Deletes one chunk of hashes from the target table.
struct HashDeletion<'a, S: ?Sized> {
    store: &'a mut S,
    table: &'a TableName,
}

#[async_trait]
impl<'a, S: DataStore + ?Sized> ChunkMutation<RowHash> for HashDeletion<'a, S> {
    async fn apply(&mut self, chunk: Vec<RowHash>) -> anyhow::Result<()> {
        self.store.delete_by_hash(self.table, chunk).await
    }
}

/// Rows to remove from and add to the target.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaPlan {
    pub to_delete: RowHashSet,
    pub to_add: RowHashSet,
    /// `(|to_delete| + |to_add|) / max(1, |target|)`
    pub ratio: f64,
}

impl DeltaPlan {
    pub fn compute(source: &RowHashSet, target: &RowHashSet) -> Self {
        let to_delete: RowHashSet = target.difference(source).cloned().collect();
        let to_add: RowHashSet = source.difference(target).cloned().collect();
        let ratio = (to_delete.len() + to_add.len()) as f64 / target.len().max(1) as f64;
        Self {
            to_delete,
            to_add,
            ratio,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty()
    }
}

/// Counts of what an incremental sync changed on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncDelta {
    pub deleted: usize,
    pub added: usize,
}

/// Bring the target in line with the source by transferring only the rows
/// whose hash differs.
///
/// Fails without touching the target when the target table is missing, the
/// structures differ, the source has no hash column, or the tables diverge
/// by more than `options.max_divergence`.
pub async fn sync_incremental<S, T, X>(
    table: &TableName,
    source: &mut S,
    target: &mut T,
    transfer: &X,
    options: &CopyOptions,
) -> Result<SyncDelta>
where
    S: DataStore + ?Sized,
    T: DataStore + ?Sized,
    X: RemoteFileTransfer + ?Sized,
{
    if !target.table_exists(table).await? {
        return Err(Precondition::MissingTargetTable.into());
    }
    if !schemas_match(table, source, target, true).await? {
        return Err(Precondition::SchemaMismatch.into());
    }
    if !source
        .schema(table)
        .await?
        .mentions_column(&options.hash_column)
    {
        return Err(Precondition::MissingHashColumn(options.hash_column.clone()).into());
    }

    debug!("Syncing table {}", table);
    let source_hashes = source.current_hash_set(table).await?;
    let target_hashes = target.current_hash_set(table).await?;
    let plan = DeltaPlan::compute(&source_hashes, &target_hashes);
    drop(source_hashes);
    drop(target_hashes);

    if plan.ratio > options.max_divergence {
        return Err(CopyError::DivergenceTooLarge {
            ratio: plan.ratio,
            limit: options.max_divergence,
        });
    }

    let delta = SyncDelta {
        deleted: plan.to_delete.len(),
        added: plan.to_add.len(),
    };
    if plan.is_empty() {
        debug!("Table {} is already in sync", table);
        return Ok(delta);
    }

    if !plan.to_delete.is_empty() {
        let mut deletion = HashDeletion {
            store: &mut *target,
            table,
        };
        BatchExecutor::new(options.batch_size)
            .run(plan.to_delete, &mut deletion)
            .await?;
    }

    if !plan.to_add.is_empty() {
        let artifact_path = source
            .export_rows(table, Some(plan.to_add), &options.dump_dir)
            .await?;

        if !artifact::fetch(
            transfer,
            source.host(),
            &options.transfer_user,
            &artifact_path,
        )
        .await
        {
            artifact::discard(&artifact_path).await;
            return Err(CopyError::Transfer {
                host: source.host().to_string(),
                path: artifact_path,
            });
        }

        let loaded = target.load_artifact(table, &artifact_path).await;
        artifact::discard(&artifact_path).await;
        loaded?;
    }

    info!(
        "Incremental sync of {}: deleted {} row(s), added {} row(s)",
        table, delta.deleted, delta.added
    );
    Ok(delta)
}
