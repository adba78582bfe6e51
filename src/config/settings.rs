//! Resolution of command line, configuration file and defaults into the
//! immutable settings of one run.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Result};
use copy_core::{
    dedupe_tables, CopyOptions, TableName, DEFAULT_BATCH_SIZE, DEFAULT_MAX_DIVERGENCE,
};
use copy_mysql_store::{MySqlEndpoint, TrackingColumns};

use super::{Cli, EndpointSection, FileConfig};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3306;
const DEFAULT_USER: &str = "guest";
const DEFAULT_SOURCE_DATABASE: &str = "test";
const DEFAULT_TARGET_DATABASE: &str = "test_copy";
const DEFAULT_DUMP_DIR: &str = "/share/mysql_dumps";
const DEFAULT_VERIFY_THRESHOLD: u32 = 25;

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub source: MySqlEndpoint,
    pub target: MySqlEndpoint,
    /// Deduplicated, in the order given.
    pub tables: Vec<TableName>,
    pub options: CopyOptions,
    pub columns: TrackingColumns,
    /// Already resolved: always at least one.
    pub workers: usize,
    pub verbose: bool,
    pub report_json: Option<PathBuf>,
}

impl RunSettings {
    /// Load the configuration file named on the command line, if any, and
    /// resolve.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    /// Command-line values win over file values, which win over defaults.
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self> {
        let FileConfig {
            source,
            target,
            copy,
        } = file;

        let tables = dedupe_tables(split_names(
            cli.tables.as_ref().or(copy.tables.as_ref()),
        ));
        if tables.is_empty() {
            bail!("No tables specified");
        }

        let verify_threshold = cli
            .verify_threshold
            .or(copy.verify_threshold)
            .unwrap_or(DEFAULT_VERIFY_THRESHOLD);
        if verify_threshold > 100 {
            bail!("Verify threshold must be between 0 and 100 percent, got {verify_threshold}");
        }

        let batch_size = cli
            .batch_size
            .or(copy.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            bail!("Batch size must be at least 1");
        }

        let columns = TrackingColumns {
            hash: cli
                .hash_column
                .clone()
                .or(copy.hash_column)
                .unwrap_or_else(|| TrackingColumns::default().hash),
            modified: cli
                .modified_column
                .clone()
                .or(copy.modified_column)
                .unwrap_or_else(|| TrackingColumns::default().modified),
        };

        let debug = cli.debug || copy.debug.unwrap_or(false);
        let workers = if debug {
            1
        } else {
            resolve_workers(cli.workers.or(copy.workers).unwrap_or(0))
        };

        let options = CopyOptions {
            verify_threshold: Some(verify_threshold),
            skip_verification: split_names(
                cli.skip_verification
                    .as_ref()
                    .or(copy.skip_verification.as_ref()),
            )
            .into_iter()
            .collect::<HashSet<_>>(),
            force_full: cli.force_full || copy.force_full.unwrap_or(false),
            no_last_mod_check: cli.no_last_mod_check || copy.no_last_mod_check.unwrap_or(false),
            dump_dir: cli
                .dump_dir
                .clone()
                .or(copy.dump_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DUMP_DIR)),
            transfer_user: cli
                .transfer_user
                .clone()
                .or(copy.transfer_user)
                .unwrap_or_else(|| DEFAULT_USER.to_string()),
            hash_column: columns.hash.clone(),
            batch_size,
            max_divergence: DEFAULT_MAX_DIVERGENCE,
        };

        Ok(Self {
            source: endpoint(
                EndpointOverrides {
                    host: cli.source_host.clone(),
                    port: cli.source_port,
                    user: cli.source_user.clone(),
                    password: cli.source_password.clone(),
                    database: cli.source_database.clone(),
                },
                source,
                DEFAULT_SOURCE_DATABASE,
            ),
            target: endpoint(
                EndpointOverrides {
                    host: cli.target_host.clone(),
                    port: cli.target_port,
                    user: cli.target_user.clone(),
                    password: cli.target_password.clone(),
                    database: cli.target_database.clone(),
                },
                target,
                DEFAULT_TARGET_DATABASE,
            ),
            tables,
            options,
            columns,
            workers,
            verbose: cli.verbose,
            report_json: cli.report_json.clone(),
        })
    }
}

struct EndpointOverrides {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
}

fn endpoint(cli: EndpointOverrides, file: EndpointSection, default_database: &str) -> MySqlEndpoint {
    MySqlEndpoint {
        host: cli
            .host
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: cli.port.or(file.port).unwrap_or(DEFAULT_PORT),
        user: cli
            .user
            .or(file.user)
            .unwrap_or_else(|| DEFAULT_USER.to_string()),
        password: cli.password.or(file.password).unwrap_or_default(),
        database: cli
            .database
            .or(file.database)
            .unwrap_or_else(|| default_database.to_string()),
    }
}

/// `0` means one worker per CPU, minus one for the coordinator.
pub fn resolve_workers(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Table lists may be given as separate values or as one space or comma
/// separated string.
fn split_names(values: Option<&Vec<String>>) -> Vec<TableName> {
    values
        .into_iter()
        .flatten()
        .flat_map(|value| {
            value
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|name| !name.is_empty())
                .map(TableName::new)
                .collect::<Vec<_>>()
        })
        .collect()
}
