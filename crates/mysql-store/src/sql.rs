//! SQL text helpers.
//!
//! Table and column names cannot be bound as statement parameters, so they
//! are quoted here. Values always travel as parameters, except file paths in
//! `INTO OUTFILE` / `LOAD DATA INFILE`, which MySQL only accepts as literals.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mysql_async::Value;

/// Backtick-quote an identifier, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Single-quote a string literal, escaping backslashes and quotes.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\0' => quoted.push_str("\\0"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

/// `?, ?, ?` for `count` positional parameters.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Name of the scratch table used for filtered exports.
pub fn scratch_table(table: &str) -> String {
    format!("tmp_sync_{table}")
}

/// Convert a `DATETIME`/`TIMESTAMP` result into a naive timestamp.
/// `NULL` (no rows, or only `NULL`s) yields `None`.
pub fn value_to_datetime(value: &Value) -> anyhow::Result<Option<NaiveDateTime>> {
    match value {
        Value::NULL => Ok(None),
        Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = NaiveDate::from_ymd_opt(i32::from(*year), u32::from(*month), u32::from(*day))
                .ok_or_else(|| anyhow::anyhow!("Invalid date {year}-{month}-{day}"))?;
            let time = NaiveTime::from_hms_micro_opt(
                u32::from(*hour),
                u32::from(*min),
                u32::from(*sec),
                *micro,
            )
            .ok_or_else(|| anyhow::anyhow!("Invalid time {hour}:{min}:{sec}.{micro}"))?;
            Ok(Some(NaiveDateTime::new(date, time)))
        }
        Value::Bytes(bytes) => {
            let text = std::str::from_utf8(bytes)?;
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
                .map(Some)
                .map_err(|e| anyhow::anyhow!("Invalid datetime '{text}': {e}"))
        }
        other => anyhow::bail!("Expected a datetime, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("orders"), "`orders`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("/share/a.tsv"), "'/share/a.tsv'");
        assert_eq!(quote_literal("it's"), "'it\\'s'");
        assert_eq!(quote_literal("C:\\dumps"), "'C:\\\\dumps'");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_datetime_conversion() {
        let stamp = value_to_datetime(&Value::Date(2010, 11, 23, 5, 0, 0, 0))
            .unwrap()
            .unwrap();
        assert_eq!(stamp.to_string(), "2010-11-23 05:00:00");

        let parsed = value_to_datetime(&Value::Bytes(b"2010-11-23 05:00:00".to_vec()))
            .unwrap()
            .unwrap();
        assert_eq!(parsed, stamp);

        assert_eq!(value_to_datetime(&Value::NULL).unwrap(), None);
        assert!(value_to_datetime(&Value::Int(3)).is_err());
    }
}
