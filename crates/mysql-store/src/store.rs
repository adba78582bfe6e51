//! [`DataStore`] over a single MySQL connection.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use copy_core::batch::ChunkMutation;
use copy_core::{
    BatchExecutor, DataStore, LastModified, RowHash, RowHashSet, SchemaDescriptor, TableName,
};
use mysql_async::prelude::*;
use mysql_async::{Conn, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::TrackingColumns;
use crate::sql::{placeholders, quote_identifier, quote_literal, scratch_table, value_to_datetime};

pub struct MySqlStore {
    conn: Conn,
    host: String,
    database: String,
    columns: TrackingColumns,
    batch_size: usize,
}

impl MySqlStore {
    pub(crate) fn new(
        conn: Conn,
        host: String,
        database: String,
        columns: TrackingColumns,
        batch_size: usize,
    ) -> Self {
        Self {
            conn,
            host,
            database,
            columns,
            batch_size,
        }
    }

    async fn column_exists(&mut self, table: &TableName, column: &str) -> Result<bool> {
        let count: Option<u64> = self
            .conn
            .exec_first(
                "SELECT COUNT(*) FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?",
                (table.as_str(), column),
            )
            .await?;
        Ok(count.unwrap_or(0) > 0)
    }

    fn artifact_path(&self, table: &TableName, dir: &Path) -> PathBuf {
        dir.join(format!("{}-{}.tsv", table, Uuid::new_v4()))
    }

    async fn export_table(&mut self, table: &str, artifact: &Path) -> Result<()> {
        let path = artifact
            .to_str()
            .with_context(|| format!("Artifact path {} is not UTF-8", artifact.display()))?;
        let query = format!(
            "SELECT * FROM {} INTO OUTFILE {}",
            quote_identifier(table),
            quote_literal(path)
        );
        debug!("{}", query);
        self.conn.query_drop(query).await?;
        Ok(())
    }

    async fn export_filtered(
        &mut self,
        table: &TableName,
        hashes: RowHashSet,
        artifact: &Path,
    ) -> Result<()> {
        let scratch = scratch_table(table.as_str());
        self.conn
            .query_drop(format!("DROP TABLE IF EXISTS {}", quote_identifier(&scratch)))
            .await?;
        self.conn
            .query_drop(format!(
                "CREATE TABLE {} LIKE {}",
                quote_identifier(&scratch),
                quote_identifier(table.as_str())
            ))
            .await?;

        let filled = async {
            let mut fill = ScratchFill {
                conn: &mut self.conn,
                insert_prefix: format!(
                    "INSERT INTO {} SELECT * FROM {} WHERE {} IN",
                    quote_identifier(&scratch),
                    quote_identifier(table.as_str()),
                    quote_identifier(&self.columns.hash)
                ),
            };
            BatchExecutor::new(self.batch_size)
                .run(hashes, &mut fill)
                .await?;
            self.export_table(&scratch, artifact).await
        }
        .await;

        let dropped = self
            .conn
            .query_drop(format!("DROP TABLE IF EXISTS {}", quote_identifier(&scratch)))
            .await;
        if let Err(e) = &dropped {
            warn!("Unable to drop scratch table {}: {}", scratch, e);
        }
        filled?;
        dropped?;
        Ok(())
    }
}

/// Copies one chunk of source rows, selected by hash, into the scratch table.
struct ScratchFill<'a> {
    conn: &'a mut Conn,
    insert_prefix: String,
}

#[async_trait]
impl<'a> ChunkMutation<RowHash> for ScratchFill<'a> {
    async fn apply(&mut self, chunk: Vec<RowHash>) -> Result<()> {
        let query = format!("{} ({})", self.insert_prefix, placeholders(chunk.len()));
        let params: Vec<Value> = chunk.into_iter().map(Value::from).collect();
        self.conn.exec_drop(query, params).await?;
        Ok(())
    }
}

#[async_trait]
impl DataStore for MySqlStore {
    fn host(&self) -> &str {
        &self.host
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn table_exists(&mut self, table: &TableName) -> Result<bool> {
        debug!("Checking if {} exists on {}", table, self.host);
        let count: Option<u64> = self
            .conn
            .exec_first(
                "SELECT COUNT(*) FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
                (table.as_str(),),
            )
            .await?;
        Ok(count.unwrap_or(0) > 0)
    }

    async fn row_count(&mut self, table: &TableName) -> Result<Option<u64>> {
        if !self.table_exists(table).await? {
            debug!(
                "Table {}.{} does not exist on host {}",
                self.database, table, self.host
            );
            return Ok(None);
        }
        let count: Option<u64> = self
            .conn
            .query_first(format!("SELECT COUNT(*) FROM {}", quote_identifier(table.as_str())))
            .await?;
        debug!(
            "Row count for {}.{} on {} is {:?}",
            self.database, table, self.host, count
        );
        Ok(Some(count.unwrap_or(0)))
    }

    async fn schema(&mut self, table: &TableName) -> Result<SchemaDescriptor> {
        debug!(
            "Determining the structure of {}.{} on {}",
            self.database, table, self.host
        );
        let row: Option<(String, String)> = self
            .conn
            .query_first(format!("SHOW CREATE TABLE {}", quote_identifier(table.as_str())))
            .await
            .with_context(|| format!("Failed to read the structure of {table}"))?;
        let (_, ddl) = row.with_context(|| format!("No structure reported for {table}"))?;
        Ok(SchemaDescriptor::new(ddl))
    }

    async fn max_modified(&mut self, table: &TableName) -> Result<Option<LastModified>> {
        let column = self.columns.modified.clone();
        if !self.column_exists(table, &column).await? {
            debug!("Table {} has no {} column", table, column);
            return Ok(None);
        }
        let value: Option<Value> = self
            .conn
            .query_first(format!(
                "SELECT MAX({}) FROM {}",
                quote_identifier(&column),
                quote_identifier(table.as_str())
            ))
            .await?;
        match value {
            Some(value) => value_to_datetime(&value),
            None => Ok(None),
        }
    }

    async fn current_hash_set(&mut self, table: &TableName) -> Result<RowHashSet> {
        debug!("Fetching the field hash set for {}", table);
        let query = format!(
            "SELECT {} FROM {}",
            quote_identifier(&self.columns.hash),
            quote_identifier(table.as_str())
        );
        let hashes = self
            .conn
            .query_fold(query, RowHashSet::new(), |mut hashes, hash: Option<String>| {
                if let Some(hash) = hash {
                    hashes.insert(hash);
                }
                hashes
            })
            .await?;
        Ok(hashes)
    }

    async fn export_rows(
        &mut self,
        table: &TableName,
        filter: Option<RowHashSet>,
        dir: &Path,
    ) -> Result<PathBuf> {
        let artifact = self.artifact_path(table, dir);
        debug!(
            "Dumping {}.{} to {}",
            self.database,
            table,
            artifact.display()
        );
        match filter {
            Some(hashes) => self.export_filtered(table, hashes, &artifact).await?,
            None => self.export_table(table.as_str(), &artifact).await?,
        }
        Ok(artifact)
    }

    async fn load_artifact(&mut self, table: &TableName, artifact: &Path) -> Result<()> {
        let size = tokio::fs::metadata(artifact).await.map(|m| m.len()).ok();
        debug!(
            "Loading {} ({:?} bytes) into {}.{} on {}",
            artifact.display(),
            size,
            self.database,
            table,
            self.host
        );
        let path = artifact
            .to_str()
            .with_context(|| format!("Artifact path {} is not UTF-8", artifact.display()))?;
        self.conn
            .query_drop(format!(
                "LOAD DATA INFILE {} INTO TABLE {}",
                quote_literal(path),
                quote_identifier(table.as_str())
            ))
            .await
            .with_context(|| format!("Failed to load {} into {}", artifact.display(), table))?;
        Ok(())
    }

    async fn truncate(&mut self, table: &TableName) -> Result<()> {
        self.conn
            .query_drop(format!("TRUNCATE TABLE {}", quote_identifier(table.as_str())))
            .await?;
        Ok(())
    }

    async fn create_with_schema(
        &mut self,
        table: &TableName,
        schema: &SchemaDescriptor,
    ) -> Result<()> {
        debug!(
            "Initializing the structure of {}.{} on {}",
            self.database, table, self.host
        );
        self.conn
            .query_drop(format!("DROP TABLE IF EXISTS {}", quote_identifier(table.as_str())))
            .await?;
        self.conn
            .query_drop(schema.as_str())
            .await
            .with_context(|| format!("Failed to create {table}"))?;
        Ok(())
    }

    async fn delete_by_hash(&mut self, table: &TableName, chunk: Vec<RowHash>) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let quoted = quote_identifier(table.as_str());
        self.conn
            .query_drop(format!("ALTER TABLE {quoted} DISABLE KEYS"))
            .await?;

        let query = format!(
            "DELETE FROM {} WHERE {} IN ({})",
            quoted,
            quote_identifier(&self.columns.hash),
            placeholders(chunk.len())
        );
        let params: Vec<Value> = chunk.into_iter().map(Value::from).collect();
        let deleted = self.conn.exec_drop(query, params).await;

        let enabled = self
            .conn
            .query_drop(format!("ALTER TABLE {quoted} ENABLE KEYS"))
            .await;
        deleted?;
        enabled?;
        Ok(())
    }
}
