//! In-memory collaborators for exercising the engine without a database.
//!
//! [`MemoryStore`] keeps its tables behind shared state, so a clone handed to
//! the engine (directly or through a [`MemoryConnector`]) and the clone kept
//! by a test observe the same data. Artifacts are real files: exports write
//! one `hash<TAB>last_modified` line per row into the dump directory and
//! loads read them back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    DataStore, LastModified, RemoteFileTransfer, RowHash, RowHashSet, SchemaDescriptor,
    StoreConnector, TableName,
};

const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NULL_MARKER: &str = "\\N";

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    TableExists,
    RowCount,
    Schema,
    MaxModified,
    HashSet,
    Export,
    Load,
    Truncate,
    Create,
    Delete,
}

/// Data-moving calls observed by a [`MemoryStore`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Exported { table: TableName, rows: usize },
    Loaded { table: TableName, rows: usize },
    Truncated(TableName),
    Created(TableName),
    Deleted { table: TableName, rows: usize },
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Error,
    Panic,
}

#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub hashes: RowHashSet,
    pub last_modified: Option<LastModified>,
    columns: Vec<String>,
    indexes: Vec<String>,
    ddl: Option<SchemaDescriptor>,
}

impl MemoryTable {
    /// A table without a hash column.
    pub fn plain() -> Self {
        Self {
            hashes: RowHashSet::new(),
            last_modified: None,
            columns: vec![
                "`id` int(11) NOT NULL AUTO_INCREMENT".to_string(),
                "`payload` varchar(255) DEFAULT NULL".to_string(),
            ],
            indexes: Vec::new(),
            ddl: None,
        }
    }

    /// A table carrying `fieldHash` and `lastModifiedDate` columns.
    pub fn hashed() -> Self {
        let mut table = Self::plain();
        table
            .columns
            .push("`fieldHash` char(32) DEFAULT NULL".to_string());
        table
            .columns
            .push("`lastModifiedDate` datetime DEFAULT NULL".to_string());
        table
    }

    /// An empty table created from a definition taken from another store.
    pub fn from_schema(schema: SchemaDescriptor) -> Self {
        Self {
            hashes: RowHashSet::new(),
            last_modified: None,
            columns: Vec::new(),
            indexes: Vec::new(),
            ddl: Some(schema),
        }
    }

    pub fn with_hashes<I, H>(mut self, hashes: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<RowHash>,
    {
        self.hashes.extend(hashes.into_iter().map(Into::into));
        self
    }

    pub fn with_index(mut self, name: &str) -> Self {
        self.indexes.push(name.to_string());
        self
    }

    pub fn with_last_modified(mut self, stamp: Option<LastModified>) -> Self {
        self.last_modified = stamp;
        self
    }

    /// `SHOW CREATE TABLE`-style rendering.
    fn definition(&self, name: &str) -> SchemaDescriptor {
        if let Some(ddl) = &self.ddl {
            return ddl.clone();
        }
        let mut lines: Vec<String> = self.columns.iter().map(|c| format!("  {c}")).collect();
        lines.push("  PRIMARY KEY (`id`)".to_string());
        lines.extend(
            self.indexes
                .iter()
                .map(|index| format!("  KEY `{index}` (`payload`)")),
        );
        SchemaDescriptor::new(format!(
            "CREATE TABLE `{name}` (\n{}\n) ENGINE=InnoDB AUTO_INCREMENT={} DEFAULT CHARSET=utf8",
            lines.join(",\n"),
            self.hashes.len() + 1
        ))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, MemoryTable>,
    calls: Vec<StoreCall>,
    faults: HashMap<(String, StoreOp), Fault>,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    host: String,
    database: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            database: "test".to_string(),
            state: Arc::default(),
        }
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    pub fn with_table(self, name: &str, table: MemoryTable) -> Self {
        self.state().tables.insert(name.to_string(), table);
        self
    }

    /// Snapshot of a table.
    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.state().tables.get(name).cloned()
    }

    pub fn hashes(&self, name: &str) -> Option<RowHashSet> {
        self.table(name).map(|t| t.hashes)
    }

    /// Mutate a table in place. Returns `false` when it does not exist.
    pub fn update_table(&self, name: &str, update: impl FnOnce(&mut MemoryTable)) -> bool {
        match self.state().tables.get_mut(name) {
            Some(table) => {
                update(table);
                true
            }
            None => false,
        }
    }

    pub fn drop_table(&self, name: &str) {
        self.state().tables.remove(name);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Make `op` on `table` return an error.
    pub fn fail_on(&self, table: &str, op: StoreOp) {
        self.state()
            .faults
            .insert((table.to_string(), op), Fault::Error);
    }

    /// Make `op` on `table` panic.
    pub fn panic_on(&self, table: &str, op: StoreOp) {
        self.state()
            .faults
            .insert((table.to_string(), op), Fault::Panic);
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            store: self.clone(),
            refuse: false,
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, table: &TableName, op: StoreOp) -> Result<()> {
        let fault = self
            .state()
            .faults
            .get(&(table.as_str().to_string(), op))
            .copied();
        match fault {
            None => Ok(()),
            Some(Fault::Error) => bail!("injected {:?} failure on {}", op, table),
            Some(Fault::Panic) => panic!("injected {op:?} panic on {table}"),
        }
    }

    fn record(&self, call: StoreCall) {
        self.state().calls.push(call);
    }

    fn with_existing<R>(
        &self,
        table: &TableName,
        read: impl FnOnce(&mut MemoryTable) -> R,
    ) -> Result<R> {
        let mut state = self.state();
        let existing = state
            .tables
            .get_mut(table.as_str())
            .ok_or_else(|| anyhow!("Table '{}.{}' doesn't exist", self.database, table))?;
        Ok(read(existing))
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    fn host(&self) -> &str {
        &self.host
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn table_exists(&mut self, table: &TableName) -> Result<bool> {
        self.check(table, StoreOp::TableExists)?;
        Ok(self.state().tables.contains_key(table.as_str()))
    }

    async fn row_count(&mut self, table: &TableName) -> Result<Option<u64>> {
        self.check(table, StoreOp::RowCount)?;
        Ok(self
            .state()
            .tables
            .get(table.as_str())
            .map(|t| t.hashes.len() as u64))
    }

    async fn schema(&mut self, table: &TableName) -> Result<SchemaDescriptor> {
        self.check(table, StoreOp::Schema)?;
        self.with_existing(table, |t| t.definition(table.as_str()))
    }

    async fn max_modified(&mut self, table: &TableName) -> Result<Option<LastModified>> {
        self.check(table, StoreOp::MaxModified)?;
        self.with_existing(table, |t| {
            if t.hashes.is_empty() {
                None
            } else {
                t.last_modified
            }
        })
    }

    async fn current_hash_set(&mut self, table: &TableName) -> Result<RowHashSet> {
        self.check(table, StoreOp::HashSet)?;
        self.with_existing(table, |t| t.hashes.clone())
    }

    async fn export_rows(
        &mut self,
        table: &TableName,
        filter: Option<RowHashSet>,
        dir: &Path,
    ) -> Result<PathBuf> {
        self.check(table, StoreOp::Export)?;
        let (rows, modified) = self.with_existing(table, |t| {
            let rows: Vec<RowHash> = match &filter {
                Some(wanted) => t.hashes.intersection(wanted).cloned().collect(),
                None => t.hashes.iter().cloned().collect(),
            };
            (rows, t.last_modified)
        })?;

        let stamp = modified
            .map(|m| m.format(STAMP_FORMAT).to_string())
            .unwrap_or_else(|| NULL_MARKER.to_string());
        let body: String = rows.iter().map(|h| format!("{h}\t{stamp}\n")).collect();
        let path = dir.join(format!("{}-{}.tsv", table, Uuid::new_v4()));
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write artifact {}", path.display()))?;

        self.record(StoreCall::Exported {
            table: table.clone(),
            rows: rows.len(),
        });
        Ok(path)
    }

    async fn load_artifact(&mut self, table: &TableName, artifact: &Path) -> Result<()> {
        self.check(table, StoreOp::Load)?;
        let body = tokio::fs::read_to_string(artifact)
            .await
            .with_context(|| format!("Failed to read artifact {}", artifact.display()))?;

        let mut hashes = Vec::new();
        let mut newest: Option<LastModified> = None;
        for line in body.lines().filter(|l| !l.is_empty()) {
            let (hash, stamp) = line
                .split_once('\t')
                .ok_or_else(|| anyhow!("Malformed artifact line: {line}"))?;
            if stamp != NULL_MARKER {
                let stamp = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT)
                    .with_context(|| format!("Malformed timestamp in artifact: {stamp}"))?;
                newest = newest.max(Some(stamp));
            }
            hashes.push(hash.to_string());
        }

        let rows = hashes.len();
        self.with_existing(table, |t| {
            t.hashes.extend(hashes);
            t.last_modified = t.last_modified.max(newest);
        })?;
        self.record(StoreCall::Loaded {
            table: table.clone(),
            rows,
        });
        Ok(())
    }

    async fn truncate(&mut self, table: &TableName) -> Result<()> {
        self.check(table, StoreOp::Truncate)?;
        self.with_existing(table, |t| {
            t.hashes.clear();
            t.last_modified = None;
        })?;
        self.record(StoreCall::Truncated(table.clone()));
        Ok(())
    }

    async fn create_with_schema(
        &mut self,
        table: &TableName,
        schema: &SchemaDescriptor,
    ) -> Result<()> {
        self.check(table, StoreOp::Create)?;
        self.state().tables.insert(
            table.as_str().to_string(),
            MemoryTable::from_schema(schema.clone()),
        );
        self.record(StoreCall::Created(table.clone()));
        Ok(())
    }

    async fn delete_by_hash(&mut self, table: &TableName, chunk: Vec<RowHash>) -> Result<()> {
        self.check(table, StoreOp::Delete)?;
        let rows = chunk.len();
        self.with_existing(table, |t| {
            for hash in &chunk {
                t.hashes.remove(hash);
            }
        })?;
        self.record(StoreCall::Deleted {
            table: table.clone(),
            rows,
        });
        Ok(())
    }
}

/// Hands out clones of one [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    store: MemoryStore,
    refuse: bool,
}

impl MemoryConnector {
    /// Every connection attempt fails.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    type Store = MemoryStore;

    async fn connect(&self) -> Result<MemoryStore> {
        if self.refuse {
            bail!("Connection refused by {}", self.store.host);
        }
        Ok(self.store.clone())
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.store.database, self.store.host)
    }
}

/// Transfer that leaves artifacts where they are (source and target share
/// the local filesystem) and records every request.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransfer {
    fail_retrieval: bool,
    fail_cleanup: bool,
    retrievals: Arc<Mutex<Vec<(String, PathBuf)>>>,
    removals: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl MemoryTransfer {
    pub fn failing_retrieval(mut self) -> Self {
        self.fail_retrieval = true;
        self
    }

    pub fn failing_cleanup(mut self) -> Self {
        self.fail_cleanup = true;
        self
    }

    /// `(host, path)` of every retrieval attempt.
    pub fn retrievals(&self) -> Vec<(String, PathBuf)> {
        self.retrievals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `(host, path)` of every successful remote removal.
    pub fn removals(&self) -> Vec<(String, PathBuf)> {
        self.removals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RemoteFileTransfer for MemoryTransfer {
    async fn retrieve(&self, host: &str, _principal: &str, remote: &Path, _local: &Path) -> bool {
        self.retrievals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((host.to_string(), remote.to_path_buf()));
        !self.fail_retrieval
    }

    async fn remove_remote(&self, host: &str, _principal: &str, remote: &Path) -> Result<()> {
        if self.fail_cleanup {
            bail!("Permission denied removing {} on {}", remote.display(), host);
        }
        self.removals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((host.to_string(), remote.to_path_buf()));
        Ok(())
    }
}
