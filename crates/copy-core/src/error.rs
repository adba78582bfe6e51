//! Error taxonomy of a table pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Why an incremental sync refused to run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("target table does not exist")]
    MissingTargetTable,

    #[error("source and target table structures differ")]
    SchemaMismatch,

    #[error("source table has no '{0}' column")]
    MissingHashColumn(String),
}

/// Failure of a copy stage for one table.
///
/// Recoverable failures of an incremental sync are answered with a full copy.
/// Store faults (`Unexpected`) end the table as failed.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("incremental sync not possible: {0}")]
    Precondition(#[from] Precondition),

    #[error("tables differ by {:.1}% (limit {:.1}%), a full copy is cheaper", .ratio * 100.0, .limit * 100.0)]
    DivergenceTooLarge { ratio: f64, limit: f64 },

    #[error("source table does not exist")]
    MissingSourceTable,

    #[error("failed to retrieve {} from {host}", .path.display())]
    Transfer { host: String, path: PathBuf },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl CopyError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CopyError::Precondition(_)
                | CopyError::DivergenceTooLarge { .. }
                | CopyError::Transfer { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CopyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(CopyError::from(Precondition::SchemaMismatch).is_recoverable());
        assert!(CopyError::DivergenceTooLarge {
            ratio: 0.5,
            limit: 0.4
        }
        .is_recoverable());
        assert!(CopyError::Transfer {
            host: "replica".to_string(),
            path: PathBuf::from("/tmp/a.tsv"),
        }
        .is_recoverable());
        assert!(!CopyError::MissingSourceTable.is_recoverable());
        assert!(!CopyError::Unexpected(anyhow::anyhow!("connection reset")).is_recoverable());
    }

    #[test]
    fn test_divergence_message() {
        let err = CopyError::DivergenceTooLarge {
            ratio: 0.5,
            limit: 0.4,
        };
        assert_eq!(
            err.to_string(),
            "tables differ by 50.0% (limit 40.0%), a full copy is cheaper"
        );
    }
}
