//! schemalink command-line tool.
//!
//! Lists and describes database type descriptors, prints synthesized
//! connection strings, and collects a home schema together with the remote
//! tables that reference it.
//!
//! # Security Guarantees
//! - Read-only database sessions
//! - Passwords come from the environment or a prompt and are never logged
//! - Connection strings are redacted in logs

use anyhow::Context;
use clap::Parser;
use schemalink_collect::{Cli, Command, commands};
use schemalink_core::logging::init_logging;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    let store = cli.global.descriptor_store();
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Command::List => commands::list_types(&store, &mut stdout)?,
        Command::Describe(args) => commands::describe_type(&store, args, &mut stdout)
            .with_context(|| format!("Failed to describe database type '{}'", args.db_type))?,
        Command::Url(args) => commands::print_url(&store, args, &mut stdout)
            .with_context(|| format!("Failed to build a connection string for '{}'", args.db_type))?,
        Command::Collect(args) => {
            drop(stdout);
            let cancel = CancellationToken::new();
            let signal_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received; stopping after the current table");
                    signal_token.cancel();
                }
            });

            let (graph, summary) = commands::collect(&store, args, &cancel)
                .await
                .context("Schema collection failed")?;

            info!("✓ Schema collection completed");
            println!("Schema collection completed successfully");
            println!("Output: {}", args.output.display());
            println!("Tables: {}", graph.tables.len());
            println!("Procedures: {}", graph.procedures.len());
            println!(
                "Remote tables linked: {} ({} degraded)",
                summary.tables_linked, summary.tables_degraded
            );
            println!("Cross-schema edges: {}", summary.edges_added);
        }
    }

    Ok(())
}
