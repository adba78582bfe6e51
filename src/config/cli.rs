//! Command-line arguments.
//!
//! Every option is optional here so that an unset flag falls through to the
//! configuration file and then to the built-in default.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "table-sync")]
#[command(about = "Copy MySQL tables from one server to another, incrementally when possible")]
#[command(
    long_about = "Copies a set of tables from a (possibly remote) source database to a target \
database. Unchanged tables are skipped, tables that differ by a few rows are patched using \
per-row content hashes, and everything else is copied in full. Command-line options take \
precedence over the configuration file."
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short = 'f', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Host to copy from [default: localhost]
    #[arg(short = 'G', long, value_name = "HOST")]
    pub source_host: Option<String>,

    /// Source server port [default: 3306]
    #[arg(long, value_name = "PORT")]
    pub source_port: Option<u16>,

    /// Source database user [default: guest]
    #[arg(short = 'U', long, value_name = "USER", env = "TABLE_SYNC_SOURCE_USER")]
    pub source_user: Option<String>,

    /// Source database password
    #[arg(
        short = 'W',
        long,
        value_name = "PASSWORD",
        env = "TABLE_SYNC_SOURCE_PASSWORD",
        hide_env_values = true
    )]
    pub source_password: Option<String>,

    /// Source database [default: test]
    #[arg(short = 'D', long, value_name = "DBNAME")]
    pub source_database: Option<String>,

    /// Host to copy to [default: localhost]
    #[arg(short = 'I', long, value_name = "HOST")]
    pub target_host: Option<String>,

    /// Target server port [default: 3306]
    #[arg(long, value_name = "PORT")]
    pub target_port: Option<u16>,

    /// Target database user [default: guest]
    #[arg(short = 'u', long, value_name = "USER", env = "TABLE_SYNC_TARGET_USER")]
    pub target_user: Option<String>,

    /// Target database password
    #[arg(
        short = 'w',
        long,
        value_name = "PASSWORD",
        env = "TABLE_SYNC_TARGET_PASSWORD",
        hide_env_values = true
    )]
    pub target_password: Option<String>,

    /// Target database [default: test_copy]
    #[arg(short = 'd', long, value_name = "DBNAME")]
    pub target_database: Option<String>,

    /// User to retrieve dump files as when the source host is remote [default: guest]
    #[arg(short = 's', long, value_name = "USER")]
    pub transfer_user: Option<String>,

    /// Tables to copy, space or comma separated
    #[arg(short = 't', long, value_name = "TABLES", num_args = 1..)]
    pub tables: Option<Vec<String>>,

    /// Tables exempt from the row-count verification, space or comma separated
    #[arg(short = 'T', long, value_name = "TABLES", num_args = 1..)]
    pub skip_verification: Option<Vec<String>>,

    /// Dump directory, shared by source and target; must be world writable [default: /share/mysql_dumps]
    #[arg(short = 'm', long, value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,

    /// Print debug output
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Refuse to copy a table whose source has this many percent fewer rows than the target; 0 disables [default: 25]
    #[arg(short = 'V', long = "verify", value_name = "PERCENT")]
    pub verify_threshold: Option<u32>,

    /// Skip the incremental attempt and always copy in full
    #[arg(short = 'F', long)]
    pub force_full: bool,

    /// Copy even when row counts and last-modified times agree
    #[arg(short = 'n', long)]
    pub no_last_mod_check: bool,

    /// Number of tables copied in parallel; 0 means CPUs minus one [default: 0]
    #[arg(short = 'p', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Copy tables one at a time, in order
    #[arg(short = 'g', long)]
    pub debug: bool,

    /// Column holding the per-row content hash [default: fieldHash]
    #[arg(long, value_name = "COLUMN")]
    pub hash_column: Option<String>,

    /// Column holding the last modification time [default: lastModifiedDate]
    #[arg(long, value_name = "COLUMN")]
    pub modified_column: Option<String>,

    /// Maximum number of rows per bulk statement [default: 20000]
    #[arg(long, value_name = "ROWS")]
    pub batch_size: Option<usize>,

    /// Write the run report as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub report_json: Option<PathBuf>,
}
