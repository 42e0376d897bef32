//! Catalog metadata access.
//!
//! The linker reads foreign keys, procedures and table names through the
//! [`MetadataSource`] trait so it can run against a live database or an
//! in-memory double.
//!
//! # Module Structure
//! - `helpers`: row decoding shared by sqlx-backed sources
//! - `postgres`: PostgreSQL catalog queries (feature `postgresql`)

use crate::connection::{ConnectionConfig, Credentials};
use crate::models::{Procedure, TableRef};
use crate::{Result, error::SchemaLinkError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "postgresql")]
pub mod helpers;
#[cfg(feature = "postgresql")]
pub mod postgres;

#[cfg(feature = "postgresql")]
pub use postgres::PgMetadataSource;

/// One column pair of a foreign key declared on a table.
///
/// Shaped like a row of JDBC `DatabaseMetaData.getImportedKeys`: the
/// referenced side is the primary-key side, rule codes use the JDBC values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedKey {
    /// Constraint name, when the catalog reports one
    pub constraint_name: Option<String>,
    /// Referencing column on the table being read
    pub fk_column: String,
    /// Schema of the referenced table
    pub pk_schema: Option<String>,
    /// Referenced table
    pub pk_table: String,
    /// Referenced column
    pub pk_column: String,
    /// JDBC `importedKey*` update rule
    pub update_rule: i16,
    /// JDBC `importedKey*` delete rule
    pub delete_rule: i16,
}

/// Read-only access to a database catalog.
///
/// # Object Safety
/// This trait is object-safe so sources can be passed around as
/// `&dyn MetadataSource` or `Box<dyn MetadataSource>`.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Foreign-key columns declared on `table`, ordered by referenced table
    /// and key position.
    ///
    /// # Errors
    /// `MetadataAccess` when the catalog cannot be read.
    async fn imported_keys(&self, table: &TableRef) -> Result<Vec<ImportedKey>>;

    /// Stored procedures and functions defined in `schema`.
    async fn procedures(&self, schema: &str) -> Result<Vec<Procedure>>;

    /// Names of the base tables in `schema`.
    async fn tables(&self, schema: &str) -> Result<Vec<String>>;

    /// Short name of the database engine, recorded on the schema graph.
    fn database_type(&self) -> &'static str;

    /// Releases any connections the source holds. Sources without
    /// connections keep the default, which does nothing.
    async fn close(&self) {}
}

/// Opens a metadata source for a synthesized connection string.
///
/// The engine is chosen by the connection string's scheme.
///
/// # Errors
/// `Configuration` when no compiled-in source handles the scheme,
/// `Connection` when the pool cannot be created.
pub async fn open_source(
    connection_string: &str,
    config: &ConnectionConfig,
    credentials: Option<&Credentials>,
) -> Result<Box<dyn MetadataSource>> {
    let scheme = connection_string
        .split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .unwrap_or_default();

    match scheme.as_str() {
        #[cfg(feature = "postgresql")]
        "postgres" | "postgresql" => {
            let source = PgMetadataSource::connect(connection_string, config, credentials).await?;
            Ok(Box::new(source))
        }
        _ => {
            let _ = (config, credentials);
            Err(SchemaLinkError::configuration(format!(
                "no metadata source is available for connection scheme '{}'",
                scheme
            )))
        }
    }
}
