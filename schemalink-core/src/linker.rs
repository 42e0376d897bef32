//! Cross-schema foreign-key linking.
//!
//! A table outside the home schema can still reference tables inside it.
//! For each such remote table the linker reads the table's imported keys,
//! keeps the ones pointing back into the home schema and records them as
//! edges on the [`SchemaGraph`].
//!
//! Failures reading a remote table are fatal only when the run asked for
//! several schemas explicitly ([`LinkPolicy::multi_schema`]); otherwise the
//! table is skipped with a warning.

use crate::metadata::{ImportedKey, MetadataSource};
use crate::models::{ForeignKeyEdge, SchemaGraph, Table, TableRef};
use crate::{Result, error::SchemaLinkError};
use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Column patterns whose relationships are left out of the graph.
///
/// Each pattern must match a whole candidate, either `table.column` or the
/// bare column name.
#[derive(Debug, Clone, Default)]
pub struct ColumnExclusions {
    patterns: Vec<Regex>,
}

impl ColumnExclusions {
    /// Compiles the given regular expressions.
    ///
    /// # Errors
    /// `Configuration` naming the first pattern that fails to compile.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                    SchemaLinkError::configuration(format!(
                        "invalid column exclusion pattern '{}': {}",
                        pattern, e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// True when no pattern was given.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `table.column` or `column` matches any pattern.
    pub fn excludes(&self, table: &str, column: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let qualified = format!("{}.{}", table, column);
        self.patterns
            .iter()
            .any(|p| p.is_match(&qualified) || p.is_match(column))
    }
}

/// How a linking run treats rows and failures.
#[derive(Debug, Clone)]
pub struct LinkPolicy {
    /// Only edges referencing this schema are kept
    pub home_schema: String,
    /// Propagate metadata failures instead of degrading to a warning
    pub multi_schema: bool,
    /// Columns whose relationships are ignored on either side
    pub exclusions: ColumnExclusions,
}

impl LinkPolicy {
    /// Policy for `home_schema`: degrade on failure, exclude nothing.
    pub fn new(home_schema: impl Into<String>) -> Self {
        Self {
            home_schema: home_schema.into(),
            multi_schema: false,
            exclusions: ColumnExclusions::default(),
        }
    }

    /// Sets multi-schema mode.
    pub fn with_multi_schema(mut self, multi_schema: bool) -> Self {
        self.multi_schema = multi_schema;
        self
    }

    /// Sets the column exclusions.
    pub fn with_exclusions(mut self, exclusions: ColumnExclusions) -> Self {
        self.exclusions = exclusions;
        self
    }
}

/// Totals for one [`link_remote_tables`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkSummary {
    /// Tables whose keys were read
    pub tables_linked: usize,
    /// Edges appended to the graph
    pub edges_added: usize,
    /// Tables skipped because their metadata could not be read
    pub tables_degraded: usize,
}

enum TableOutcome {
    Linked(usize),
    Degraded,
}

/// Links one remote table's foreign keys into `graph`.
///
/// The table is registered as remote if the graph does not hold it yet.
/// Returns the number of edges added.
///
/// # Errors
/// The metadata error when `policy.multi_schema` is set; otherwise a
/// metadata failure is logged, recorded as a graph warning and reported as
/// zero edges.
pub async fn link_foreign_keys(
    table: &TableRef,
    policy: &LinkPolicy,
    source: &dyn MetadataSource,
    graph: &mut SchemaGraph,
) -> Result<usize> {
    match link_table(table, policy, source, graph).await? {
        TableOutcome::Linked(count) => Ok(count),
        TableOutcome::Degraded => Ok(0),
    }
}

async fn link_table(
    table: &TableRef,
    policy: &LinkPolicy,
    source: &dyn MetadataSource,
    graph: &mut SchemaGraph,
) -> Result<TableOutcome> {
    graph.remote_table_mut(table);

    let rows = match source.imported_keys(table).await {
        Ok(rows) => rows,
        Err(e) if e.is_metadata_access() && !policy.multi_schema => {
            let warning = format!(
                "Couldn't resolve foreign keys for remote table {}: {}",
                table.qualified_name(),
                e
            );
            tracing::warn!("{}", warning);
            graph.add_warning(warning);
            return Ok(TableOutcome::Degraded);
        }
        Err(e) => return Err(e),
    };

    let edges: Vec<ForeignKeyEdge> = rows
        .into_iter()
        .filter_map(|row| edge_for_row(table, policy, row))
        .collect();

    let added = edges.len();
    for edge in edges {
        mirror_edge(graph, &edge);
        graph.remote_table_mut(table).foreign_keys.push(edge);
    }

    tracing::debug!(
        "Linked {} foreign key column(s) from {}",
        added,
        table.qualified_name()
    );
    Ok(TableOutcome::Linked(added))
}

fn edge_for_row(table: &TableRef, policy: &LinkPolicy, row: ImportedKey) -> Option<ForeignKeyEdge> {
    let Some(pk_schema) = row.pk_schema.filter(|s| *s == policy.home_schema) else {
        tracing::trace!(
            "Ignoring key {}.{} -> {}: outside schema {}",
            table.qualified_name(),
            row.fk_column,
            row.pk_table,
            policy.home_schema
        );
        return None;
    };

    if policy.exclusions.excludes(&table.name, &row.fk_column)
        || policy.exclusions.excludes(&row.pk_table, &row.pk_column)
    {
        tracing::debug!(
            "Excluded relationship {}.{} -> {}.{}",
            table.name,
            row.fk_column,
            row.pk_table,
            row.pk_column
        );
        return None;
    }

    Some(ForeignKeyEdge {
        table: table.clone(),
        constraint_name: row.constraint_name,
        column: row.fk_column,
        referenced_schema: pk_schema,
        referenced_table: row.pk_table,
        referenced_column: row.pk_column,
        update_rule: row.update_rule,
        delete_rule: row.delete_rule,
    })
}

fn mirror_edge(graph: &mut SchemaGraph, edge: &ForeignKeyEdge) {
    match graph.table_mut(&edge.referenced_schema, &edge.referenced_table) {
        Some(referenced) => referenced.referenced_by.push(edge.clone()),
        None => tracing::debug!(
            "Referenced table {}.{} is not registered; edge kept on {} only",
            edge.referenced_schema,
            edge.referenced_table,
            edge.table.qualified_name()
        ),
    }
}

/// Links each table in turn, stopping between tables once `cancel` fires.
///
/// # Errors
/// `Cancelled` with the number of completed tables, or the first error
/// [`link_foreign_keys`] propagates.
pub async fn link_remote_tables(
    tables: &[TableRef],
    policy: &LinkPolicy,
    source: &dyn MetadataSource,
    graph: &mut SchemaGraph,
    cancel: &CancellationToken,
) -> Result<LinkSummary> {
    let mut summary = LinkSummary::default();

    for (completed, table) in tables.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(
                "Linking cancelled after {} of {} tables",
                completed,
                tables.len()
            );
            return Err(SchemaLinkError::Cancelled { completed });
        }

        match link_table(table, policy, source, graph).await? {
            TableOutcome::Linked(count) => {
                summary.tables_linked = summary.tables_linked.saturating_add(1);
                summary.edges_added = summary.edges_added.saturating_add(count);
            }
            TableOutcome::Degraded => {
                summary.tables_degraded = summary.tables_degraded.saturating_add(1);
            }
        }
    }

    tracing::info!(
        "Linked {} remote table(s): {} edge(s), {} degraded",
        summary.tables_linked,
        summary.edges_added,
        summary.tables_degraded
    );
    Ok(summary)
}

/// Registers the home schema's tables and procedures on `graph`.
///
/// # Errors
/// Any metadata failure; the home schema is never optional.
pub async fn seed_home_schema(source: &dyn MetadataSource, graph: &mut SchemaGraph) -> Result<()> {
    let home = graph.home_schema.clone();

    let tables = source.tables(&home).await?;
    tracing::info!("Found {} tables in schema {}", tables.len(), home);
    for name in tables {
        graph.add_table(Table::new(&home, name));
    }

    let procedures = source.procedures(&home).await?;
    graph.procedures.extend(procedures);
    graph.metadata.database_type = Some(source.database_type().to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Procedure;
    use async_trait::async_trait;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeSource {
        keys: HashMap<String, Vec<ImportedKey>>,
        failing: Vec<String>,
    }

    impl FakeSource {
        fn with_keys(mut self, table: &str, keys: Vec<ImportedKey>) -> Self {
            self.keys.insert(table.to_string(), keys);
            self
        }

        fn failing(mut self, table: &str) -> Self {
            self.failing.push(table.to_string());
            self
        }
    }

    #[async_trait]
    impl MetadataSource for FakeSource {
        async fn imported_keys(&self, table: &TableRef) -> Result<Vec<ImportedKey>> {
            let name = table.qualified_name();
            if self.failing.contains(&name) {
                return Err(SchemaLinkError::metadata_failed(
                    format!("Failed to query imported keys of {}", name),
                    std::io::Error::other("permission denied"),
                ));
            }
            Ok(self.keys.get(&name).cloned().unwrap_or_default())
        }

        async fn procedures(&self, schema: &str) -> Result<Vec<Procedure>> {
            Ok(vec![Procedure::new(schema, "audit", "  begin end  ")])
        }

        async fn tables(&self, _schema: &str) -> Result<Vec<String>> {
            Ok(vec!["customers".to_string(), "orders".to_string()])
        }

        fn database_type(&self) -> &'static str {
            "Fake"
        }
    }

    fn key(column: &str, pk_schema: &str, pk_table: &str, pk_column: &str) -> ImportedKey {
        ImportedKey {
            constraint_name: Some(format!("fk_{}", column)),
            fk_column: column.to_string(),
            pk_schema: Some(pk_schema.to_string()),
            pk_table: pk_table.to_string(),
            pk_column: pk_column.to_string(),
            update_rule: 3,
            delete_rule: 0,
        }
    }

    fn home_graph() -> SchemaGraph {
        let mut graph = SchemaGraph::new("public");
        graph.add_table(Table::new("public", "customers"));
        graph
    }

    #[tokio::test]
    async fn test_only_home_schema_rows_become_edges() {
        let source = FakeSource::default().with_keys(
            "sales.invoices",
            vec![
                key("customer_id", "public", "customers", "id"),
                key("region_id", "other", "regions", "id"),
            ],
        );
        let mut graph = home_graph();
        let table = TableRef::new("sales", "invoices");

        let added = link_foreign_keys(&table, &LinkPolicy::new("public"), &source, &mut graph)
            .await
            .unwrap();

        assert_eq!(added, 1);
        let invoices = graph.table("sales", "invoices").unwrap();
        assert!(invoices.is_remote);
        assert_eq!(invoices.foreign_keys.len(), 1);
        let edge = &invoices.foreign_keys[0];
        assert_eq!(edge.referenced(), TableRef::new("public", "customers"));
        assert_eq!(edge.column, "customer_id");

        let customers = graph.table("public", "customers").unwrap();
        assert_eq!(customers.referenced_by, vec![edge.clone()]);
    }

    #[tokio::test]
    async fn test_rows_without_schema_are_ignored() {
        let mut row = key("customer_id", "public", "customers", "id");
        row.pk_schema = None;
        let source = FakeSource::default().with_keys("sales.invoices", vec![row]);
        let mut graph = home_graph();

        let added = link_foreign_keys(
            &TableRef::new("sales", "invoices"),
            &LinkPolicy::new("public"),
            &source,
            &mut graph,
        )
        .await
        .unwrap();
        assert_eq!(added, 0);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_warning() {
        let source = FakeSource::default().failing("sales.invoices");
        let mut graph = home_graph();

        let added = link_foreign_keys(
            &TableRef::new("sales", "invoices"),
            &LinkPolicy::new("public"),
            &source,
            &mut graph,
        )
        .await
        .unwrap();

        assert_eq!(added, 0);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.metadata.warnings.len(), 1);
        assert!(graph.metadata.warnings[0].contains("sales.invoices"));
    }

    #[tokio::test]
    async fn test_failure_propagates_in_multi_schema_mode() {
        let source = FakeSource::default().failing("sales.invoices");
        let mut graph = home_graph();
        let policy = LinkPolicy::new("public").with_multi_schema(true);

        let err = link_foreign_keys(&TableRef::new("sales", "invoices"), &policy, &source, &mut graph)
            .await
            .unwrap_err();

        assert!(err.is_metadata_access());
        assert!(graph.metadata.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_excluded_columns_produce_no_edge() {
        let source = FakeSource::default().with_keys(
            "sales.invoices",
            vec![
                key("customer_id", "public", "customers", "id"),
                key("created_by", "public", "users", "id"),
                key("account_id", "public", "accounts", "legacy_key"),
            ],
        );
        let exclusions = ColumnExclusions::new(["invoices\\.created_by", "legacy_.*"]).unwrap();
        let policy = LinkPolicy::new("public").with_exclusions(exclusions);
        let mut graph = home_graph();

        let added = link_foreign_keys(&TableRef::new("sales", "invoices"), &policy, &source, &mut graph)
            .await
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(
            graph.table("sales", "invoices").unwrap().foreign_keys[0].column,
            "customer_id"
        );
    }

    #[test]
    fn test_exclusions_are_anchored() {
        let exclusions = ColumnExclusions::new(["id"]).unwrap();
        assert!(exclusions.excludes("orders", "id"));
        assert!(!exclusions.excludes("orders", "customer_id"));
        assert!(!ColumnExclusions::default().excludes("orders", "id"));
    }

    #[test]
    fn test_invalid_exclusion_pattern() {
        let err = ColumnExclusions::new(["("]).unwrap_err();
        assert!(matches!(err, SchemaLinkError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_link_remote_tables_summary() {
        let source = FakeSource::default()
            .with_keys(
                "sales.invoices",
                vec![
                    key("customer_id", "public", "customers", "id"),
                    key("billing_id", "public", "customers", "id"),
                ],
            )
            .failing("hr.staff");
        let tables = [
            TableRef::new("sales", "invoices"),
            TableRef::new("hr", "staff"),
            TableRef::new("ops", "tickets"),
        ];
        let mut graph = home_graph();

        let summary = link_remote_tables(
            &tables,
            &LinkPolicy::new("public"),
            &source,
            &mut graph,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            summary,
            LinkSummary {
                tables_linked: 2,
                edges_added: 2,
                tables_degraded: 1,
            }
        );
        assert_eq!(graph.remote_table_count(), 3);
        assert_eq!(graph.table("public", "customers").unwrap().referenced_by.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_table() {
        let source = FakeSource::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut graph = home_graph();

        let err = link_remote_tables(
            &[TableRef::new("sales", "invoices")],
            &LinkPolicy::new("public"),
            &source,
            &mut graph,
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SchemaLinkError::Cancelled { completed: 0 }));
        assert!(graph.table("sales", "invoices").is_none());
    }

    #[tokio::test]
    async fn test_seed_home_schema() {
        let source = FakeSource::default();
        let mut graph = SchemaGraph::new("public");

        seed_home_schema(&source, &mut graph).await.unwrap();

        assert_eq!(graph.tables.len(), 2);
        assert!(graph.table("public", "orders").is_some());
        assert_eq!(graph.procedures.len(), 1);
        assert_eq!(
            graph.procedures.iter().next().unwrap().definition(),
            "begin end"
        );
        assert_eq!(graph.metadata.database_type.as_deref(), Some("Fake"));
    }
}
