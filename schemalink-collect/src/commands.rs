//! Command handlers.
//!
//! Handlers that print take the writer as a parameter so tests can capture
//! what a user would see on stdout.

use crate::{CollectArgs, ConnectionArgs, DescribeArgs, output};
use schemalink_core::descriptor::{DescriptorResolver, DescriptorStore};
use schemalink_core::error::{SchemaLinkError, redact_database_url};
use schemalink_core::{
    LinkPolicy, LinkSummary, MetadataSource, Result, SchemaGraph, TableRef,
    build_connection_string, link_remote_tables, metadata, seed_home_schema,
};
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

fn write_failed(e: std::io::Error) -> SchemaLinkError {
    SchemaLinkError::Io {
        context: "Failed to write to stdout".to_string(),
        source: e,
    }
}

/// Lists the packaged database types with their descriptions.
///
/// # Errors
/// Returns an error if a packaged type fails to resolve or output fails.
pub fn list_types(store: &DescriptorStore, out: &mut impl Write) -> Result<()> {
    let resolver = DescriptorResolver::new(store);
    writeln!(out, "Packaged database types:").map_err(write_failed)?;
    for name in store.packaged_types() {
        let descriptor = resolver.resolve(&name)?;
        writeln!(
            out,
            "  {:<14} {}",
            name,
            descriptor.description().unwrap_or("")
        )
        .map_err(write_failed)?;
    }
    writeln!(out).map_err(write_failed)?;
    writeln!(
        out,
        "Types in {} override packaged types of the same name.",
        store.working_dir().display()
    )
    .map_err(write_failed)?;
    Ok(())
}

/// Prints a type's usage: its description and connection options.
///
/// # Errors
/// Returns any resolution error for the type.
pub fn describe_type(
    store: &DescriptorStore,
    args: &DescribeArgs,
    out: &mut impl Write,
) -> Result<()> {
    let descriptor = DescriptorResolver::new(store).resolve(&args.db_type)?;

    write!(out, "{}", descriptor.usage()).map_err(write_failed)?;
    writeln!(out, "   loaded from {}", descriptor.origin()).map_err(write_failed)?;

    if args.properties {
        writeln!(out).map_err(write_failed)?;
        for (key, value) in descriptor.properties() {
            writeln!(out, "   {} = {}", key, value).map_err(write_failed)?;
        }
    }
    Ok(())
}

/// Resolves the type and prints its synthesized connection string.
///
/// # Errors
/// Returns resolution, configuration or missing-option errors.
pub fn print_url(
    store: &DescriptorStore,
    args: &ConnectionArgs,
    out: &mut impl Write,
) -> Result<()> {
    let descriptor = DescriptorResolver::new(store).resolve(&args.db_type)?;
    let config = args.connection_config()?;
    let connection_string = build_connection_string(&descriptor, &config)?;
    writeln!(out, "{}", connection_string).map_err(write_failed)?;
    Ok(())
}

/// Runs a full collection: seed the home schema, link remote tables and
/// write the graph as JSON.
///
/// # Errors
/// Returns configuration, connection and metadata errors, or `Cancelled`
/// if `cancel` fires between remote tables.
pub async fn collect(
    store: &DescriptorStore,
    args: &CollectArgs,
    cancel: &CancellationToken,
) -> Result<(SchemaGraph, LinkSummary)> {
    let descriptor = DescriptorResolver::new(store).resolve(&args.connection.db_type)?;
    let mut config = args.connection.connection_config()?;
    config.username = args.user.clone();
    let policy = args.link_policy()?;
    let remote_tables = args.remote_table_refs()?;
    let credentials = args.credentials()?;

    let connection_string = build_connection_string(&descriptor, &config)?;
    info!("Starting schema collection...");
    info!("Target: {}", redact_database_url(&connection_string));
    info!("Output: {}", args.output.display());

    let source = metadata::open_source(&connection_string, &config, credentials.as_ref())
        .await
        .map_err(|e| {
            error!("Failed to open metadata source: {}", e);
            e
        })?;

    let (graph, summary) =
        collect_graph(source.as_ref(), &policy, &remote_tables, cancel).await?;

    output::save_graph(&graph, &args.output).await?;
    info!("✓ Schema graph saved to {}", args.output.display());

    Ok((graph, summary))
}

/// Seeds the home schema and links `remote_tables` into it, then closes the
/// source whether or not linking succeeded.
///
/// # Errors
/// Returns metadata errors from seeding or linking, or `Cancelled`.
pub async fn collect_graph(
    source: &dyn MetadataSource,
    policy: &LinkPolicy,
    remote_tables: &[TableRef],
    cancel: &CancellationToken,
) -> Result<(SchemaGraph, LinkSummary)> {
    let outcome = async {
        let mut graph = SchemaGraph::new(&policy.home_schema);
        seed_home_schema(source, &mut graph).await?;
        let summary = link_remote_tables(remote_tables, policy, source, &mut graph, cancel).await?;
        Ok::<_, SchemaLinkError>((graph, summary))
    }
    .await;

    source.close().await;
    outcome
}
