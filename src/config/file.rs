//! TOML configuration file.
//!
//! ```toml
//! [source]
//! host = "db1.example.com"
//! user = "guest"
//! password = ""
//! database = "test"
//!
//! [target]
//! database = "test_copy"
//!
//! [copy]
//! tables = ["orders", "customers"]
//! skip_verification = ["audit_log"]
//! verify_threshold = 25
//! dump_dir = "/share/mysql_dumps"
//! workers = 4
//! ```
//!
//! Every key is optional; unknown keys are rejected.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub source: EndpointSection,
    #[serde(default)]
    pub target: EndpointSection,
    #[serde(default)]
    pub copy: CopySection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopySection {
    pub tables: Option<Vec<String>>,
    pub skip_verification: Option<Vec<String>>,
    pub verify_threshold: Option<u32>,
    pub force_full: Option<bool>,
    pub no_last_mod_check: Option<bool>,
    pub dump_dir: Option<PathBuf>,
    pub transfer_user: Option<String>,
    pub workers: Option<usize>,
    pub debug: Option<bool>,
    pub hash_column: Option<String>,
    pub modified_column: Option<String>,
    pub batch_size: Option<usize>,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}
