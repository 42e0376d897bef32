//! Row decoding shared by sqlx-backed metadata sources.

use crate::{Result, error::SchemaLinkError};
use sqlx::{Row, postgres::PgRow};

/// Extension trait for extracting typed values from catalog rows
/// with consistent error handling.
///
/// # Example
/// ```rust,ignore
/// use schemalink_core::metadata::helpers::RowExt;
///
/// let table: String = row.get_field("pk_table", Some("public.orders"))?;
/// let constraint: Option<String> = row.get_field("constraint_name", None)?;
/// ```
pub trait RowExt {
    /// Extracts a typed field, naming the column and table on failure.
    fn get_field<'r, T>(&'r self, field_name: &str, table_context: Option<&str>) -> Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>;
}

impl RowExt for PgRow {
    fn get_field<'r, T>(&'r self, field_name: &str, table_context: Option<&str>) -> Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        self.try_get(field_name).map_err(|e| {
            let context = match table_context {
                Some(table) => format!("Failed to read column '{}' for {}", field_name, table),
                None => format!("Failed to read column '{}'", field_name),
            };
            SchemaLinkError::metadata_failed(context, e)
        })
    }
}

/// Maps a PostgreSQL `confupdtype`/`confdeltype` action code to the JDBC
/// `DatabaseMetaData` rule code.
pub fn pg_action_rule_code(action: &str) -> Option<i16> {
    match action {
        "c" => Some(0),
        "r" => Some(1),
        "n" => Some(2),
        "a" => Some(3),
        "d" => Some(4),
        _ => None,
    }
}
