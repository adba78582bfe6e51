//! Run options threaded through every stage.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::TableName;

/// Largest number of identifiers placed in one bulk statement.
pub const DEFAULT_BATCH_SIZE: usize = 20_000;

/// Fraction of changed rows above which an incremental sync is abandoned.
pub const DEFAULT_MAX_DIVERGENCE: f64 = 0.4;

/// Settings for one run, resolved once and handed to the coordinator.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Percent shortfall of source rows that fails validation. `None` or 0
    /// disables the check.
    pub verify_threshold: Option<u32>,

    /// Tables exempt from the row-count validity check.
    pub skip_verification: HashSet<TableName>,

    /// Go straight to a full copy.
    pub force_full: bool,

    /// Always copy, even when row counts, schema and last-modified agree.
    pub no_last_mod_check: bool,

    /// Directory that holds transfer artifacts on both endpoints.
    pub dump_dir: PathBuf,

    /// Principal used to retrieve artifacts from a remote source.
    pub transfer_user: String,

    /// Column carrying the per-row content hash.
    pub hash_column: String,

    pub batch_size: usize,

    pub max_divergence: f64,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            verify_threshold: Some(25),
            skip_verification: HashSet::new(),
            force_full: false,
            no_last_mod_check: false,
            dump_dir: PathBuf::from("/share/mysql_dumps"),
            transfer_user: "guest".to_string(),
            hash_column: "fieldHash".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_divergence: DEFAULT_MAX_DIVERGENCE,
        }
    }
}

impl CopyOptions {
    pub fn verifies(&self, table: &TableName) -> bool {
        !self.skip_verification.contains(table)
    }
}
