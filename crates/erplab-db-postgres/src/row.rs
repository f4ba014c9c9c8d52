//! Helpers shared by the row mappers.

use std::str::FromStr;

use sqlx_core::row::Row;
use sqlx_postgres::PgRow;

use crate::error::{StorageError, StorageResult};

/// Reads a text column into a [`text_enum!`] type.
pub(crate) fn enum_col<T>(row: &PgRow, col: &str) -> StorageResult<T>
where
    T: FromStr<Err = StorageError>,
{
    let raw: String = row.try_get(col)?;
    raw.parse()
}

pub(crate) fn opt_enum_col<T>(row: &PgRow, col: &str) -> StorageResult<Option<T>>
where
    T: FromStr<Err = StorageError>,
{
    let raw: Option<String> = row.try_get(col)?;
    raw.map(|s| s.parse()).transpose()
}

/// `%term%` for ILIKE filters, with the LIKE wildcards escaped.
pub(crate) fn contains_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern(" sala "), "%sala%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }
}
