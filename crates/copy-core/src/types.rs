//! Value types shared by every stage of the copy pipeline.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Name of a table, the unit of work of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TableName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Opaque per-row content fingerprint.
pub type RowHash = String;

/// Deduplicated set of row fingerprints for one table on one endpoint.
pub type RowHashSet = HashSet<RowHash>;

/// Maximum value of a table's modification-tracking column.
pub type LastModified = chrono::NaiveDateTime;

/// Outcome of the row-count safety guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityVerdict {
    Valid,
    Invalid,
}

impl ValidityVerdict {
    pub fn is_valid(self) -> bool {
        matches!(self, ValidityVerdict::Valid)
    }
}

impl From<bool> for ValidityVerdict {
    fn from(valid: bool) -> Self {
        if valid {
            ValidityVerdict::Valid
        } else {
            ValidityVerdict::Invalid
        }
    }
}

fn key_clause_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // An index line (`KEY name (cols)`) together with the comma that joins
        // it to its neighbour. PRIMARY and UNIQUE key lines never match.
        Regex::new(r",?\r?\n[ \t]*key.*?\),?").expect("valid key clause pattern")
    })
}

fn auto_increment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)AUTO_INCREMENT=\d+ ?").expect("valid pattern"))
}

/// Textual table definition as reported by a store (e.g. `SHOW CREATE TABLE`).
///
/// Derived on demand from the store and never cached: the source may change
/// between two calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor(String);

impl SchemaDescriptor {
    /// Wraps a raw definition, dropping any auto-increment counter so that a
    /// recreated table never starts from a stale value.
    pub fn new(ddl: impl Into<String>) -> Self {
        let ddl = ddl.into();
        Self(auto_increment_pattern().replace_all(&ddl, "").into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical form used for equality checks: lower-cased, all whitespace
    /// removed, and index clauses stripped unless `include_keys` is set.
    pub fn canonical(&self, include_keys: bool) -> String {
        let lowered = self.0.to_lowercase();
        let stripped = if include_keys {
            lowered
        } else {
            key_clause_pattern().replace_all(&lowered, "").into_owned()
        };
        stripped.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Case-insensitive check that the definition mentions `column`.
    pub fn mentions_column(&self, column: &str) -> bool {
        self.0.to_lowercase().contains(&column.to_lowercase())
    }

    pub fn matches(&self, other: &SchemaDescriptor, include_keys: bool) -> bool {
        self.canonical(include_keys) == other.canonical(include_keys)
    }
}

impl fmt::Display for SchemaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = "CREATE TABLE `t` (\n  `id` int NOT NULL,\n  `fieldHash` varchar(50) DEFAULT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB";
    const INDEXED: &str = "CREATE TABLE `t` (\n  `id` int NOT NULL,\n  `fieldHash` varchar(50) DEFAULT NULL,\n  PRIMARY KEY (`id`),\n  KEY `idx_fieldHash` (`fieldHash`)\n) ENGINE=InnoDB";

    #[test]
    fn test_auto_increment_is_stripped() {
        let schema = SchemaDescriptor::new(
            "CREATE TABLE `t` (`id` int) ENGINE=InnoDB AUTO_INCREMENT=42 DEFAULT CHARSET=utf8",
        );
        assert_eq!(
            schema.as_str(),
            "CREATE TABLE `t` (`id` int) ENGINE=InnoDB DEFAULT CHARSET=utf8"
        );
    }

    #[test]
    fn test_index_ignored_without_keys() {
        let plain = SchemaDescriptor::new(PLAIN);
        let indexed = SchemaDescriptor::new(INDEXED);
        assert!(plain.matches(&indexed, false));
        assert!(!plain.matches(&indexed, true));
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let a = SchemaDescriptor::new("CREATE TABLE t (id INT,\tname TEXT)");
        let b = SchemaDescriptor::new("create table t (id int, name text)");
        assert!(a.matches(&b, true));
    }

    #[test]
    fn test_line_endings_and_layout_are_ignored() {
        let unix = SchemaDescriptor::new(PLAIN);
        let windows = SchemaDescriptor::new(PLAIN.replace('\n', "\r\n"));
        let one_line = SchemaDescriptor::new(PLAIN.replace('\n', " "));
        assert!(unix.matches(&windows, true));
        assert!(unix.matches(&one_line, true));

        let indexed_windows = SchemaDescriptor::new(INDEXED.replace('\n', "\r\n"));
        assert!(unix.matches(&indexed_windows, false));
    }

    #[test]
    fn test_column_type_change_is_a_mismatch() {
        let a = SchemaDescriptor::new(PLAIN);
        let b = SchemaDescriptor::new(PLAIN.replace("varchar(50)", "varchar(64)"));
        assert!(!a.matches(&b, false));
    }

    #[test]
    fn test_mentions_column() {
        let schema = SchemaDescriptor::new(PLAIN);
        assert!(schema.mentions_column("fieldhash"));
        assert!(!schema.mentions_column("lastModifiedDate"));
    }
}
