//! Guards that gate a table copy.
//!
//! Each check pulls fresh state from both endpoints; nothing is cached
//! between calls or shared between tables.

use anyhow::Result;
use tracing::{debug, error};

use crate::{DataStore, TableName, ValidityVerdict};

/// Percentage by which `source_rows` falls short of `target_rows`, for log
/// output only.
pub fn shortfall_pct(source_rows: u64, target_rows: u64) -> f64 {
    if target_rows == 0 {
        return 0.0;
    }
    (1.0 - source_rows as f64 / target_rows as f64) * 100.0
}

/// Row-count rule: a source at least as large as the target always passes,
/// otherwise the shortfall must stay strictly below `threshold` percent.
///
/// Decided in integers: `(target - source) / target < threshold / 100`.
pub fn within_threshold(source_rows: u64, target_rows: u64, threshold: u32) -> bool {
    if source_rows >= target_rows {
        return true;
    }
    let missing = u128::from(target_rows - source_rows);
    missing * 100 < u128::from(threshold) * u128::from(target_rows)
}

/// Reject copying from a source that appears to have lost a large share of
/// its rows (a stale export, a partial restore) onto a healthy target.
///
/// Passes when the threshold is unset or zero, or when the target table does
/// not exist. A missing source table counts as zero source rows.
pub async fn check_validity<S, T>(
    table: &TableName,
    source: &mut S,
    target: &mut T,
    threshold: Option<u32>,
) -> Result<ValidityVerdict>
where
    S: DataStore + ?Sized,
    T: DataStore + ?Sized,
{
    let threshold = match threshold {
        None | Some(0) => return Ok(ValidityVerdict::Valid),
        Some(t) => t,
    };
    if !target.table_exists(table).await? {
        return Ok(ValidityVerdict::Valid);
    }

    let target_rows = target.row_count(table).await?.unwrap_or(0);
    let source_rows = source.row_count(table).await?.unwrap_or(0);
    let shortfall = shortfall_pct(source_rows, target_rows);

    if within_threshold(source_rows, target_rows, threshold) {
        debug!(
            "Validity check for table {}: source has {} rows, target has {} rows, {:.2} percent diff, threshold is {} percent",
            table, source_rows, target_rows, shortfall, threshold
        );
        return Ok(ValidityVerdict::Valid);
    }

    error!(
        "Table {} failed validation: source has {} rows, target has {} rows, {:.2} percent diff, threshold is {} percent",
        table, source_rows, target_rows, shortfall, threshold
    );
    Ok(ValidityVerdict::Invalid)
}

/// Compare the table definitions on both endpoints. With `include_keys`
/// unset, index clauses are ignored.
pub async fn schemas_match<S, T>(
    table: &TableName,
    source: &mut S,
    target: &mut T,
    include_keys: bool,
) -> Result<bool>
where
    S: DataStore + ?Sized,
    T: DataStore + ?Sized,
{
    let source_schema = source.schema(table).await?;
    let target_schema = target.schema(table).await?;

    let source_form = source_schema.canonical(include_keys);
    let target_form = target_schema.canonical(include_keys);
    if source_form != target_form {
        debug!(
            "Structure of {} differs (include_keys={}):\n  source: {}\n  target: {}",
            table, include_keys, source_form, target_form
        );
        return Ok(false);
    }
    Ok(true)
}

/// True iff both endpoints hold the same number of rows and report the same
/// maximum modification time. A table without a modification column, or
/// with differing row counts, never compares equal.
pub async fn last_modified_matches<S, T>(
    table: &TableName,
    source: &mut S,
    target: &mut T,
) -> Result<bool>
where
    S: DataStore + ?Sized,
    T: DataStore + ?Sized,
{
    let source_rows = source.row_count(table).await?;
    let target_rows = target.row_count(table).await?;
    if source_rows != target_rows {
        debug!(
            "Row counts of {} differ ({:?} vs {:?}), skipping last-modified comparison",
            table, source_rows, target_rows
        );
        return Ok(false);
    }

    let source_mod = source.max_modified(table).await?;
    let target_mod = target.max_modified(table).await?;
    match (source_mod, target_mod) {
        (Some(s), Some(t)) => Ok(s == t),
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, MemoryTable};
    use chrono::NaiveDate;

    fn table() -> TableName {
        TableName::new("orders")
    }

    fn rows(n: usize) -> MemoryTable {
        MemoryTable::plain().with_hashes((0..n).map(|i| i.to_string()))
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(!within_threshold(75, 100, 25));
        assert!(within_threshold(75, 100, 26));
        assert!(within_threshold(100, 100, 1));
        assert!(within_threshold(120, 100, 1));
        assert!(within_threshold(0, 0, 1));
    }

    #[test]
    fn test_exact_shortfall_fails() {
        for target in [7u64, 100, 300, 1000] {
            for source in 0..target {
                let missing = (target - source) * 100;
                if missing % target != 0 {
                    continue;
                }
                let shortfall = u32::try_from(missing / target).unwrap();
                assert!(
                    !within_threshold(source, target, shortfall),
                    "{source}/{target} passed at threshold {shortfall}"
                );
                assert!(within_threshold(source, target, shortfall + 1));
            }
        }
        assert!(!within_threshold(90, 100, 10));
        assert!(!within_threshold(80, 100, 20));
        assert!(!within_threshold(930, 1000, 7));
        assert!(within_threshold(67, 100, 34));
    }

    #[tokio::test]
    async fn test_disabled_threshold_always_passes() {
        let mut source = MemoryStore::new("localhost");
        let mut target = MemoryStore::new("localhost").with_table("orders", rows(10));

        for threshold in [None, Some(0)] {
            let verdict = check_validity(&table(), &mut source, &mut target, threshold)
                .await
                .unwrap();
            assert!(verdict.is_valid());
        }
    }

    #[tokio::test]
    async fn test_missing_target_passes() {
        let mut source = MemoryStore::new("localhost").with_table("orders", rows(1));
        let mut target = MemoryStore::new("localhost");
        let verdict = check_validity(&table(), &mut source, &mut target, Some(1))
            .await
            .unwrap();
        assert!(verdict.is_valid());
    }

    #[tokio::test]
    async fn test_shrunken_source_fails() {
        let mut source = MemoryStore::new("localhost").with_table("orders", rows(75));
        let mut target = MemoryStore::new("localhost").with_table("orders", rows(100));

        let strict = check_validity(&table(), &mut source, &mut target, Some(25))
            .await
            .unwrap();
        assert_eq!(strict, ValidityVerdict::Invalid);

        let lenient = check_validity(&table(), &mut source, &mut target, Some(26))
            .await
            .unwrap();
        assert_eq!(lenient, ValidityVerdict::Valid);
    }

    #[tokio::test]
    async fn test_schema_comparison_honours_keys() {
        let mut source = MemoryStore::new("localhost").with_table("orders", MemoryTable::hashed());
        let mut target = MemoryStore::new("localhost")
            .with_table("orders", MemoryTable::hashed().with_index("idx_hash"));

        assert!(schemas_match(&table(), &mut source, &mut target, false)
            .await
            .unwrap());
        assert!(!schemas_match(&table(), &mut source, &mut target, true)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_last_modified_comparison() {
        let stamp = NaiveDate::from_ymd_opt(2010, 11, 23)
            .unwrap()
            .and_hms_opt(5, 0, 0)
            .unwrap();
        let earlier = stamp - chrono::Duration::days(1);

        let mut source = MemoryStore::new("localhost")
            .with_table("orders", rows(1).with_last_modified(Some(stamp)));
        let mut target = MemoryStore::new("localhost")
            .with_table("orders", rows(1).with_last_modified(Some(earlier)));
        assert!(!last_modified_matches(&table(), &mut source, &mut target)
            .await
            .unwrap());

        assert!(target.update_table("orders", |t| t.last_modified = Some(stamp)));
        assert!(last_modified_matches(&table(), &mut source, &mut target)
            .await
            .unwrap());

        source.update_table("orders", |t| {
            t.hashes.insert("extra".to_string());
        });
        assert!(!last_modified_matches(&table(), &mut source, &mut target)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_missing_modified_column_never_matches() {
        let mut source = MemoryStore::new("localhost").with_table("orders", rows(1));
        let mut target = MemoryStore::new("localhost").with_table("orders", rows(1));
        assert!(!last_modified_matches(&table(), &mut source, &mut target)
            .await
            .unwrap());
    }
}
