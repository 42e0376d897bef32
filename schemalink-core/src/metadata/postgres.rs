//! PostgreSQL catalog metadata source.
//!
//! # Security Features
//! - Every pooled session is read-only by default
//! - `statement_timeout` bounds each catalog query
//! - Connection strings are redacted before they reach logs or errors
//! - Passwords are applied to connect options, never to the URL

use super::helpers::{RowExt, pg_action_rule_code};
use super::{ImportedKey, MetadataSource};
use crate::connection::{ConnectionConfig, Credentials};
use crate::error::{SchemaLinkError, redact_database_url};
use crate::models::{Procedure, TableRef};
use crate::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

/// Foreign-key columns of one table, one row per (constraint, key position).
const IMPORTED_KEYS_QUERY: &str = r#"
    SELECT
        c.conname::text AS constraint_name,
        fa.attname::text AS fk_column,
        pns.nspname::text AS pk_schema,
        pc.relname::text AS pk_table,
        pa.attname::text AS pk_column,
        c.confupdtype::text AS update_action,
        c.confdeltype::text AS delete_action
    FROM pg_catalog.pg_constraint c
    JOIN pg_catalog.pg_class fc ON fc.oid = c.conrelid
    JOIN pg_catalog.pg_namespace fns ON fns.oid = fc.relnamespace
    JOIN pg_catalog.pg_class pc ON pc.oid = c.confrelid
    JOIN pg_catalog.pg_namespace pns ON pns.oid = pc.relnamespace
    CROSS JOIN LATERAL unnest(c.conkey, c.confkey)
        WITH ORDINALITY AS k(fk_attnum, pk_attnum, key_position)
    JOIN pg_catalog.pg_attribute fa
        ON fa.attrelid = c.conrelid AND fa.attnum = k.fk_attnum
    JOIN pg_catalog.pg_attribute pa
        ON pa.attrelid = c.confrelid AND pa.attnum = k.pk_attnum
    WHERE c.contype = 'f'
      AND fns.nspname = $1
      AND fc.relname = $2
    ORDER BY pns.nspname, pc.relname, c.conname, k.key_position
"#;

const PROCEDURES_QUERY: &str = r#"
    SELECT
        n.nspname::text AS schema_name,
        p.proname::text AS procedure_name,
        pg_get_functiondef(p.oid)::text AS definition
    FROM pg_catalog.pg_proc p
    JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
    WHERE n.nspname = $1
      AND p.prokind IN ('f', 'p')
    ORDER BY p.proname, p.oid
"#;

const TABLES_QUERY: &str = r#"
    SELECT c.relname::text AS table_name
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
      AND c.relkind IN ('r', 'p')
    ORDER BY c.relname
"#;

/// Metadata source backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgMetadataSource {
    pool: PgPool,
}

impl PgMetadataSource {
    /// Creates a lazily connecting pool for `connection_string`.
    ///
    /// # Security
    /// Session settings from `config` are applied to every pooled
    /// connection. When `credentials` are given they override any user
    /// or password embedded in the URL.
    ///
    /// # Errors
    /// `Configuration` if the connection string does not parse,
    /// `Connection` if the pool cannot be created.
    pub async fn connect(
        connection_string: &str,
        config: &ConnectionConfig,
        credentials: Option<&Credentials>,
    ) -> Result<Self> {
        use sqlx::Executor;

        config.validate()?;

        let mut options: PgConnectOptions = connection_string.parse().map_err(|e| {
            SchemaLinkError::configuration(format!(
                "Invalid PostgreSQL connection string {}: {}",
                redact_database_url(connection_string),
                e
            ))
        })?;

        if let Some(creds) = credentials {
            options = options.username(creds.username());
            if let Some(password) = creds.password() {
                options = options.password(password);
            }
        } else if let Some(username) = config.username.as_deref() {
            options = options.username(username);
        }

        let query_timeout_secs = config.query_timeout.as_secs();
        let read_only = config.read_only;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(
                        format!("SET statement_timeout = '{}s'", query_timeout_secs).as_str(),
                    )
                    .await?;

                    let app_name = format!("schemalink-{}", env!("CARGO_PKG_VERSION"));
                    conn.execute(format!("SET application_name = '{}'", app_name).as_str())
                        .await?;

                    if read_only {
                        conn.execute("SET default_transaction_read_only = on")
                            .await?;
                    }

                    Ok(())
                })
            })
            .connect_lazy_with(options);

        tracing::debug!(
            "Created PostgreSQL pool for {}",
            redact_database_url(connection_string)
        );

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Checks that the database answers a trivial query.
    ///
    /// # Errors
    /// `Connection` when no connection can be established.
    pub async fn test_connection(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(SchemaLinkError::connection_failed)?;
        Ok(())
    }

}

#[async_trait]
impl MetadataSource for PgMetadataSource {
    async fn imported_keys(&self, table: &TableRef) -> Result<Vec<ImportedKey>> {
        let context = table.qualified_name();
        tracing::trace!("Querying imported keys of {}", context);

        let rows = sqlx::query(IMPORTED_KEYS_QUERY)
            .bind(&table.schema)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SchemaLinkError::metadata_failed(
                    format!("Failed to query imported keys of {}", context),
                    e,
                )
            })?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in &rows {
            let update_action: String = row.get_field("update_action", Some(&context))?;
            let delete_action: String = row.get_field("delete_action", Some(&context))?;
            keys.push(ImportedKey {
                constraint_name: row.get_field("constraint_name", Some(&context))?,
                fk_column: row.get_field("fk_column", Some(&context))?,
                pk_schema: row.get_field("pk_schema", Some(&context))?,
                pk_table: row.get_field("pk_table", Some(&context))?,
                pk_column: row.get_field("pk_column", Some(&context))?,
                // Unknown action codes read as NO ACTION, the catalog default
                update_rule: pg_action_rule_code(&update_action).unwrap_or(3),
                delete_rule: pg_action_rule_code(&delete_action).unwrap_or(3),
            });
        }

        Ok(keys)
    }

    async fn procedures(&self, schema: &str) -> Result<Vec<Procedure>> {
        let rows = sqlx::query(PROCEDURES_QUERY)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SchemaLinkError::metadata_failed(
                    format!("Failed to query procedures in schema {}", schema),
                    e,
                )
            })?;

        let mut procedures = Vec::with_capacity(rows.len());
        for row in &rows {
            let schema_name: String = row.get_field("schema_name", None)?;
            let name: String = row.get_field("procedure_name", None)?;
            let definition: Option<String> = row.get_field("definition", Some(&name))?;
            procedures.push(Procedure::new(
                schema_name,
                name,
                definition.unwrap_or_default(),
            ));
        }

        tracing::debug!("Found {} procedures in schema {}", procedures.len(), schema);
        Ok(procedures)
    }

    async fn tables(&self, schema: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(TABLES_QUERY)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SchemaLinkError::metadata_failed(
                    format!("Failed to query tables in schema {}", schema),
                    e,
                )
            })?;

        rows.iter()
            .map(|row| row.get_field("table_name", None))
            .collect()
    }

    fn database_type(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn close(&self) {
        tracing::debug!("Closing PostgreSQL metadata pool");
        self.pool.close().await;
    }
}
