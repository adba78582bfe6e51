//! Collaborator contracts the engine is written against.
//!
//! The engine owns no SQL and no transfer protocol. A concrete store (MySQL,
//! the in-memory fake, ...) implements [`DataStore`]; a [`StoreConnector`]
//! hands out a fresh, unshared store per table pipeline; a
//! [`RemoteFileTransfer`] moves artifacts from a remote source host.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

use crate::{LastModified, RowHash, RowHashSet, SchemaDescriptor, TableName};

/// Operations the engine invokes on one endpoint.
///
/// A store wraps a single connection and is never shared between
/// concurrently running pipelines, hence `&mut self` everywhere.
///
/// Every operation fails with an error rather than returning a default,
/// except [`DataStore::max_modified`], which reports `None` when the table
/// has no modification-tracking column.
#[async_trait]
pub trait DataStore: Send {
    /// Host the store lives on; used to decide whether artifacts need a
    /// remote retrieval.
    fn host(&self) -> &str;

    /// Logical database name, for log context.
    fn database(&self) -> &str;

    async fn table_exists(&mut self, table: &TableName) -> Result<bool>;

    /// Row count, or `None` when the table does not exist.
    async fn row_count(&mut self, table: &TableName) -> Result<Option<u64>>;

    /// Current table definition with auto-increment counters normalized out.
    async fn schema(&mut self, table: &TableName) -> Result<SchemaDescriptor>;

    /// Maximum of the modification-tracking column. `None` when the column
    /// does not exist or the table is empty.
    async fn max_modified(&mut self, table: &TableName) -> Result<Option<LastModified>>;

    async fn current_hash_set(&mut self, table: &TableName) -> Result<RowHashSet>;

    /// Server-side bulk export of all rows, or only the rows whose hash is in
    /// `filter`, into a uniquely named artifact inside `dir`.
    async fn export_rows(
        &mut self,
        table: &TableName,
        filter: Option<RowHashSet>,
        dir: &Path,
    ) -> Result<PathBuf>;

    async fn load_artifact(&mut self, table: &TableName, artifact: &Path) -> Result<()>;

    async fn truncate(&mut self, table: &TableName) -> Result<()>;

    /// Drop the table if it exists and recreate it from `schema`.
    async fn create_with_schema(&mut self, table: &TableName, schema: &SchemaDescriptor)
        -> Result<()>;

    /// Delete every row whose hash is in `chunk`. Called once per batch.
    async fn delete_by_hash(&mut self, table: &TableName, chunk: Vec<RowHash>) -> Result<()>;
}

/// Factory for per-pipeline store connections.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Store: DataStore + 'static;

    async fn connect(&self) -> Result<Self::Store>;

    /// Human-readable endpoint identity (`database@host`), never credentials.
    fn describe(&self) -> String;
}

/// Moves a transfer artifact from a remote host to the local filesystem.
#[async_trait]
pub trait RemoteFileTransfer: Send + Sync {
    /// Copy `remote` on `host` to `local`, authenticating as `principal`.
    /// Returns `false` when the transfer did not succeed.
    async fn retrieve(&self, host: &str, principal: &str, remote: &Path, local: &Path) -> bool;

    /// Best-effort removal of the artifact left on the remote host.
    async fn remove_remote(&self, host: &str, principal: &str, remote: &Path) -> Result<()>;
}
