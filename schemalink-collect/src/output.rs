//! File output for collected schema graphs.

use schemalink_core::{Result, SchemaGraph, SchemaLinkError};
use std::path::Path;

/// Serializes the graph as pretty JSON.
///
/// # Errors
/// Returns a serialization error if the graph cannot be encoded.
pub fn render_graph(graph: &SchemaGraph) -> Result<String> {
    serde_json::to_string_pretty(graph).map_err(|e| SchemaLinkError::Serialization {
        context: "Failed to serialize schema graph".to_string(),
        source: e,
    })
}

/// Writes the graph to `output_path` as pretty JSON.
///
/// # Errors
/// Returns a serialization or I/O error.
pub async fn save_graph(graph: &SchemaGraph, output_path: &Path) -> Result<()> {
    let json_data = render_graph(graph)?;
    tokio::fs::write(output_path, json_data)
        .await
        .map_err(|e| SchemaLinkError::Io {
            context: format!("Failed to write to {}", output_path.display()),
            source: e,
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemalink_core::{Procedure, Table};

    #[tokio::test]
    async fn test_save_graph_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");

        let mut graph = SchemaGraph::new("public");
        graph.add_table(Table::new("public", "customers"));
        graph.procedures.insert(Procedure::new("public", "touch", " begin end "));
        graph.add_warning("Couldn't resolve foreign keys for remote table audit.events".to_string());

        save_graph(&graph, &path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let restored: SchemaGraph = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.home_schema, "public");
        assert!(restored.table("public", "customers").is_some());
        assert_eq!(restored.procedures, graph.procedures);
        assert_eq!(restored.metadata.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_save_graph_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("graph.json");

        let err = save_graph(&SchemaGraph::new("public"), &path).await.unwrap_err();
        assert!(err.to_string().contains("I/O operation failed"));
        assert!(matches!(err, SchemaLinkError::Io { ref context, .. } if context.contains("graph.json")));
    }
}
