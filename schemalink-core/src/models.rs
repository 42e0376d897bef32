//! Core data models for the linked schema graph.
//!
//! The graph is the hand-off point to documentation renderers: tables keyed
//! by qualified name, the foreign-key edges attached to them, and the stored
//! procedures captured for the home schema. Everything here serializes with
//! serde so a run can be written out as JSON.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Referential actions for foreign keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    /// Changes propagate to referencing rows
    Cascade,
    /// Changes are rejected while referenced
    Restrict,
    /// Referencing columns are set to NULL
    SetNull,
    /// Checked at the end of the statement
    NoAction,
    /// Referencing columns take their default
    SetDefault,
}

impl ReferentialAction {
    /// Maps a JDBC `DatabaseMetaData.importedKey*` rule code.
    pub const fn from_rule_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Cascade),
            1 => Some(Self::Restrict),
            2 => Some(Self::SetNull),
            3 => Some(Self::NoAction),
            4 => Some(Self::SetDefault),
            _ => None,
        }
    }

    /// The JDBC rule code for this action.
    pub const fn rule_code(self) -> i16 {
        match self {
            Self::Cascade => 0,
            Self::Restrict => 1,
            Self::SetNull => 2,
            Self::NoAction => 3,
            Self::SetDefault => 4,
        }
    }
}

/// Builds the registry key for a table.
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", schema, table)
}

/// A schema-qualified table reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema name
    pub schema: String,
    /// Table name
    pub name: String,
}

impl TableRef {
    /// Creates a reference to `schema.name`.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parses `schema.table`; the split happens at the first dot.
    pub fn parse(qualified: &str) -> Option<Self> {
        let (schema, name) = qualified.split_once('.')?;
        let (schema, name) = (schema.trim(), name.trim());
        if schema.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(schema, name))
    }

    /// The `schema.table` registry key.
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.schema, &self.name)
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A single-column foreign-key relationship.
///
/// Multi-column constraints produce one edge per column pair, all sharing the
/// same `constraint_name`. Edges are immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    /// The referencing (child) table
    pub table: TableRef,
    /// Constraint the column pair belongs to
    pub constraint_name: Option<String>,
    /// Referencing column
    pub column: String,
    /// Schema of the referenced table, always the home schema
    pub referenced_schema: String,
    /// Referenced table
    pub referenced_table: String,
    /// Referenced column
    pub referenced_column: String,
    /// JDBC rule code, see [`ReferentialAction::from_rule_code`]
    pub update_rule: i16,
    /// JDBC rule code, see [`ReferentialAction::from_rule_code`]
    pub delete_rule: i16,
}

impl ForeignKeyEdge {
    /// The referenced (parent) table.
    pub fn referenced(&self) -> TableRef {
        TableRef::new(&self.referenced_schema, &self.referenced_table)
    }

    /// Decoded update rule.
    pub const fn on_update(&self) -> Option<ReferentialAction> {
        ReferentialAction::from_rule_code(self.update_rule)
    }

    /// Decoded delete rule.
    pub const fn on_delete(&self) -> Option<ReferentialAction> {
        ReferentialAction::from_rule_code(self.delete_rule)
    }
}

/// A table in the schema graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Schema name
    pub schema: String,
    /// Table name
    pub name: String,
    /// Lives outside the home schema but is related to it
    pub is_remote: bool,
    /// Edges where this table is the referencing side
    pub foreign_keys: Vec<ForeignKeyEdge>,
    /// Edges from other tables pointing at this one
    pub referenced_by: Vec<ForeignKeyEdge>,
}

impl Table {
    /// Creates a home-schema table with no edges.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            is_remote: false,
            foreign_keys: Vec::new(),
            referenced_by: Vec::new(),
        }
    }

    /// Creates a table that lives outside the home schema.
    pub fn remote(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            is_remote: true,
            ..Self::new(schema, name)
        }
    }

    /// Reference to this table.
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.schema, &self.name)
    }
}

/// A stored procedure capture.
///
/// The definition is trimmed on construction, so two captures that differ
/// only in leading or trailing whitespace are equal. Ordering and equality
/// look at the name first, then the definition; the schema is carried along
/// but does not take part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ProcedureFields")]
pub struct Procedure {
    schema: String,
    name: String,
    definition: String,
}

#[derive(Deserialize)]
struct ProcedureFields {
    schema: String,
    name: String,
    definition: String,
}

impl From<ProcedureFields> for Procedure {
    fn from(fields: ProcedureFields) -> Self {
        Self::new(fields.schema, fields.name, fields.definition)
    }
}

impl Procedure {
    /// Creates a capture; the definition is trimmed.
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        definition: impl AsRef<str>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            definition: definition.as_ref().trim().to_string(),
        }
    }

    /// Schema the procedure lives in.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Procedure name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Trimmed source text.
    pub fn definition(&self) -> &str {
        &self.definition
    }
}

impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Procedure {}

impl PartialOrd for Procedure {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Procedure {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.definition.cmp(&other.definition))
    }
}

/// Procedures de-duplicated and ordered by name then definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcedureSet(BTreeSet<Procedure>);

impl ProcedureSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a procedure; returns false when an equal capture is already held.
    pub fn insert(&mut self, procedure: Procedure) -> bool {
        self.0.insert(procedure)
    }

    /// Whether an equal capture is held.
    pub fn contains(&self, procedure: &Procedure) -> bool {
        self.0.contains(procedure)
    }

    /// Number of distinct captures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no procedure is held.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Captures in name, then definition, order.
    pub fn iter(&self) -> impl Iterator<Item = &Procedure> {
        self.0.iter()
    }
}

impl FromIterator<Procedure> for ProcedureSet {
    fn from_iter<I: IntoIterator<Item = Procedure>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Procedure> for ProcedureSet {
    fn extend<I: IntoIterator<Item = Procedure>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Collection metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMetadata {
    /// When the graph was created
    pub collected_at: chrono::DateTime<chrono::Utc>,
    /// Version of the crate that produced the graph
    pub collector_version: String,
    /// Engine name reported by the metadata source, e.g. `PostgreSQL`
    pub database_type: Option<String>,
    /// Tables that were degraded instead of failing the run
    pub warnings: Vec<String>,
}

/// The linked schema model handed to renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaGraph {
    /// Version of the serialized layout
    pub format_version: String,
    /// Schema the documentation is centred on
    pub home_schema: String,
    /// Tables keyed by `schema.table`
    pub tables: BTreeMap<String, Table>,
    /// Stored procedures of the home schema
    pub procedures: ProcedureSet,
    /// Run details and warnings
    pub metadata: GraphMetadata,
}

impl SchemaGraph {
    /// Creates an empty graph for the given home schema.
    pub fn new(home_schema: impl Into<String>) -> Self {
        Self {
            format_version: "1.0".to_string(),
            home_schema: home_schema.into(),
            tables: BTreeMap::new(),
            procedures: ProcedureSet::new(),
            metadata: GraphMetadata {
                collected_at: chrono::Utc::now(),
                collector_version: env!("CARGO_PKG_VERSION").to_string(),
                database_type: None,
                warnings: Vec::new(),
            },
        }
    }

    /// Registers a table, replacing any previous entry with the same name.
    pub fn add_table(&mut self, table: Table) {
        self.tables
            .insert(qualified_name(&table.schema, &table.name), table);
    }

    /// Looks up a registered table.
    pub fn table(&self, schema: &str, name: &str) -> Option<&Table> {
        self.tables.get(&qualified_name(schema, name))
    }

    /// Mutable lookup of a registered table.
    pub fn table_mut(&mut self, schema: &str, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(&qualified_name(schema, name))
    }

    /// Returns the entry for `table_ref`, creating a remote table if needed.
    pub fn remote_table_mut(&mut self, table_ref: &TableRef) -> &mut Table {
        self.tables
            .entry(table_ref.qualified_name())
            .or_insert_with(|| Table::remote(&table_ref.schema, &table_ref.name))
    }

    /// Adds a warning to the collection metadata
    pub fn add_warning(&mut self, warning: String) {
        self.metadata.warnings.push(warning);
    }

    /// Total number of edges held by referencing tables.
    pub fn edge_count(&self) -> usize {
        self.tables.values().map(|t| t.foreign_keys.len()).sum()
    }

    /// Number of tables outside the home schema.
    pub fn remote_table_count(&self) -> usize {
        self.tables.values().filter(|t| t.is_remote).count()
    }
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
