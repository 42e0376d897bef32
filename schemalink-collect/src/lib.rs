//! Library module for schemalink-collect
//!
//! Holds the CLI definition and command handlers so they can be tested
//! without spawning the binary. `main.rs` only parses, sets up logging and
//! dispatches.

pub mod commands;
pub mod output;

use clap::{Args, Parser, Subcommand};
use schemalink_core::{
    ColumnExclusions, ConnectionConfig, Credentials, LinkPolicy, Result, SchemaLinkError,
    TableRef, descriptor::DescriptorStore,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "schemalink")]
#[command(about = "Database type descriptors, connection strings and cross-schema links")]
#[command(version)]
#[command(long_about = "
schemalink - resolve database type descriptors and link schemas

Database types are described by .properties files. A type can extend another
(extends=parent) and copy single values from others (include.1=type::key).
Each type's connectionSpec template, e.g. postgres://<host>:<port>/<database>,
declares the options needed to connect.

LOOKUP ORDER for a type name:
  1. a file with exactly that name in the types directory
  2. <type>.properties in the types directory
  3. a packaged type

EXAMPLES:
  schemalink list
  schemalink describe mssql-named
  schemalink url -t pgsql --host db1 -d sales
  schemalink url -t pgsql-ssl --host db1 -d sales --connection-options sslmode=require
  schemalink collect -t pgsql --host db1 -d sales -u reader --remote-table audit.events
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the packaged database types
    List,
    /// Show a database type's connection options
    Describe(DescribeArgs),
    /// Print the connection string synthesized for a database type
    Url(ConnectionArgs),
    /// Collect the home schema and link remote tables into it
    Collect(CollectArgs),
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Directory searched for database type files
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        env = "SCHEMALINK_TYPES_DIR",
        default_value = "."
    )]
    pub types_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Database type name
    #[arg(value_name = "TYPE")]
    pub db_type: String,

    /// Print every resolved property, not just the options
    #[arg(long)]
    pub properties: bool,
}

#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Database type name
    #[arg(short = 't', long = "type", value_name = "TYPE", env = "SCHEMALINK_DB_TYPE")]
    pub db_type: String,

    /// Database server host
    #[arg(long)]
    pub host: Option<String>,

    /// Database server port (defaults to the type's default-port)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database name
    #[arg(short, long)]
    pub database: Option<String>,

    /// Named server instance
    #[arg(long)]
    pub instance: Option<String>,

    /// Values for other template options
    #[arg(
        long = "connection-options",
        value_name = "NAME=VALUE",
        help = "Value for a connection template option (repeatable)"
    )]
    pub connection_options: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Database user
    #[arg(short, long, env = "SCHEMALINK_USER")]
    pub user: Option<String>,

    /// Database password
    #[arg(
        long,
        env = "SCHEMALINK_PASSWORD",
        hide_env_values = true,
        help = "Database password (prefer the environment variable or --password-prompt)"
    )]
    pub password: Option<String>,

    /// Prompt for the password without echoing it
    #[arg(long, conflicts_with = "password")]
    pub password_prompt: bool,

    /// Schema the documentation is centred on
    #[arg(short, long, default_value = "public")]
    pub schema: String,

    /// Remote tables to link, as schema.table
    #[arg(long = "remote-table", value_name = "SCHEMA.TABLE", value_delimiter = ',')]
    pub remote_tables: Vec<String>,

    /// Treat failures reading remote tables as fatal
    #[arg(long)]
    pub multi_schema: bool,

    /// Regular expressions for columns whose relationships are ignored
    #[arg(long = "exclude-columns", value_name = "REGEX", value_delimiter = ',')]
    pub exclude_columns: Vec<String>,

    /// Output file path
    #[arg(short, long, default_value = "schemalink.json")]
    pub output: PathBuf,
}

impl GlobalArgs {
    /// Descriptor store over the types directory and the packaged types.
    pub fn descriptor_store(&self) -> DescriptorStore {
        DescriptorStore::new().with_working_dir(&self.types_dir)
    }
}

impl ConnectionArgs {
    /// Builds a validated connection configuration from the flags.
    ///
    /// # Errors
    /// Returns a configuration error for a malformed `--connection-options`
    /// value or an invalid field.
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        let mut config = ConnectionConfig::new()
            .with_extra_option_pairs(&self.connection_options)?;
        config.host = self.host.clone();
        config.port = self.port;
        config.database = self.database.clone();
        config.instance = self.instance.clone();
        config.validate()?;
        Ok(config)
    }
}

impl CollectArgs {
    /// Parses the `--remote-table` values.
    ///
    /// # Errors
    /// Returns a configuration error for a value that is not `schema.table`.
    pub fn remote_table_refs(&self) -> Result<Vec<TableRef>> {
        self.remote_tables
            .iter()
            .map(|value| {
                TableRef::parse(value.trim()).ok_or_else(|| {
                    SchemaLinkError::configuration(format!(
                        "remote table '{}' must have the form schema.table",
                        value
                    ))
                })
            })
            .collect()
    }

    /// Builds the link policy for this run.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid exclusion pattern.
    pub fn link_policy(&self) -> Result<LinkPolicy> {
        Ok(LinkPolicy::new(&self.schema)
            .with_multi_schema(self.multi_schema)
            .with_exclusions(ColumnExclusions::new(&self.exclude_columns)?))
    }

    /// Resolves credentials from the flags, environment or a prompt.
    ///
    /// # Security
    /// The password is never logged and is zeroed when the credentials drop.
    ///
    /// # Errors
    /// Returns a configuration error if the prompt cannot be read.
    pub fn credentials(&self) -> Result<Option<Credentials>> {
        let Some(user) = self.user.clone() else {
            if self.password.is_some() || self.password_prompt {
                tracing::warn!("A password was supplied without --user; it will be ignored");
            }
            return Ok(None);
        };

        let password = if self.password_prompt {
            let entered = rpassword::prompt_password(format!("Password for {}: ", user))
                .map_err(|e| {
                    SchemaLinkError::configuration(format!("Failed to read password: {}", e))
                })?;
            Some(entered)
        } else {
            self.password.clone()
        };

        Ok(Some(Credentials::new(user, password)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_command() {
        let cli = Cli::try_parse_from([
            "schemalink",
            "url",
            "-t",
            "pgsql",
            "--host",
            "db1",
            "--port",
            "6543",
            "-d",
            "sales",
            "--connection-options",
            "sslmode=require",
            "--connection-options",
            "appName=docs",
        ])
        .unwrap();

        let Command::Url(args) = cli.command else {
            panic!("expected url command");
        };
        let config = args.connection_config().unwrap();
        assert_eq!(config.host.as_deref(), Some("db1"));
        assert_eq!(config.port, Some(6543));
        assert_eq!(config.database.as_deref(), Some("sales"));
        assert_eq!(config.extra_options["sslmode"], "require");
        assert_eq!(config.extra_options["appName"], "docs");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["schemalink", "list", "-vv", "--types-dir", "/tmp/types"])
            .unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.types_dir, PathBuf::from("/tmp/types"));
    }

    #[test]
    fn test_malformed_connection_option_rejected() {
        let cli = Cli::try_parse_from([
            "schemalink",
            "url",
            "-t",
            "pgsql",
            "--connection-options",
            "sslmode",
        ])
        .unwrap();
        let Command::Url(args) = cli.command else {
            panic!("expected url command");
        };
        assert!(args.connection_config().is_err());
    }

    #[test]
    fn test_collect_args() {
        let cli = Cli::try_parse_from([
            "schemalink",
            "collect",
            "-t",
            "pgsql",
            "--remote-table",
            "audit.events,sales.orders",
            "--exclude-columns",
            "created_by",
            "--multi-schema",
            "-s",
            "crm",
        ])
        .unwrap();
        let Command::Collect(args) = cli.command else {
            panic!("expected collect command");
        };

        let tables = args.remote_table_refs().unwrap();
        assert_eq!(
            tables,
            vec![TableRef::new("audit", "events"), TableRef::new("sales", "orders")]
        );

        let policy = args.link_policy().unwrap();
        assert_eq!(policy.home_schema, "crm");
        assert!(policy.multi_schema);
        assert!(policy.exclusions.excludes("orders", "created_by"));
        assert_eq!(args.output, PathBuf::from("schemalink.json"));
    }

    #[test]
    fn test_remote_table_requires_schema() {
        let cli = Cli::try_parse_from([
            "schemalink",
            "collect",
            "-t",
            "pgsql",
            "--remote-table",
            "orders",
        ])
        .unwrap();
        let Command::Collect(args) = cli.command else {
            panic!("expected collect command");
        };
        assert!(args.remote_table_refs().is_err());
    }

    #[test]
    fn test_credentials_need_user() {
        let cli = Cli::try_parse_from([
            "schemalink",
            "collect",
            "-t",
            "pgsql",
            "--password",
            "secret",
        ])
        .unwrap();
        let Command::Collect(args) = cli.command else {
            panic!("expected collect command");
        };
        assert!(args.credentials().unwrap().is_none());

        let cli = Cli::try_parse_from([
            "schemalink",
            "collect",
            "-t",
            "pgsql",
            "-u",
            "reader",
            "--password",
            "secret",
        ])
        .unwrap();
        let Command::Collect(args) = cli.command else {
            panic!("expected collect command");
        };
        let creds = args.credentials().unwrap().unwrap();
        assert_eq!(creds.username(), "reader");
        assert!(creds.has_password());
    }
}
