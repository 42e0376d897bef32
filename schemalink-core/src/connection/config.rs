//! Caller-supplied connection parameters.
//!
//! This module provides the `ConnectionConfig` struct: the fixed fields a
//! connection template can draw on (`host`, `port`, `database`, `instance`),
//! the free-form extra-option overlay, and pool settings used when the
//! synthesized connection string is opened.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for database connections.
///
/// # Security
/// This struct intentionally does NOT store passwords; see
/// [`super::Credentials`]. Extra options may still hold secrets if a
/// template asks for them, so they are left out of `Display`.
///
/// # Example
/// ```rust
/// use schemalink_core::connection::ConnectionConfig;
///
/// let config = ConnectionConfig::new()
///     .with_host("localhost")
///     .with_port(5432)
///     .with_database("sales")
///     .with_extra_option("sslmode", "require");
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host address
    pub host: Option<String>,
    /// Port; falls back to the descriptor's `default-port`
    pub port: Option<u16>,
    /// Database name
    pub database: Option<String>,
    /// Named server instance (SQL Server style)
    pub instance: Option<String>,
    /// Optional username (password handled separately)
    pub username: Option<String>,
    /// Values for any other template option, matched case-sensitively
    pub extra_options: BTreeMap<String, String>,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Query timeout duration
    pub query_timeout: Duration,
    /// Maximum number of connections in pool
    pub max_connections: u32,
    /// Whether to enforce read-only mode
    pub read_only: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            database: None,
            instance: None,
            username: None,
            extra_options: BTreeMap::new(),
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(30),
            // Linking issues one metadata query at a time
            max_connections: 2,
            read_only: true,
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionConfig({}{}{}{})",
            self.host.as_deref().unwrap_or("<no host>"),
            self.instance
                .as_ref()
                .map_or_else(String::new, |i| format!("\\{}", i)),
            self.port.map_or_else(String::new, |p| format!(":{}", p)),
            self.database
                .as_ref()
                .map_or_else(String::new, |db| format!("/{}", db))
        )
        // Intentionally omit username and extra options
    }
}

impl ConnectionConfig {
    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns error if configuration values are invalid or unsafe
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.as_deref().is_some_and(|h| h.trim().is_empty()) {
            return Err(crate::error::SchemaLinkError::configuration(
                "host cannot be empty",
            ));
        }

        if self.port == Some(0) {
            return Err(crate::error::SchemaLinkError::configuration(
                "port must be greater than 0",
            ));
        }

        if let Some(key) = self.extra_options.keys().find(|k| k.trim().is_empty()) {
            return Err(crate::error::SchemaLinkError::configuration(format!(
                "connection option names cannot be empty (got '{}')",
                key
            )));
        }

        if self.max_connections == 0 {
            return Err(crate::error::SchemaLinkError::configuration(
                "max_connections must be greater than 0",
            ));
        }

        if self.max_connections > 100 {
            return Err(crate::error::SchemaLinkError::configuration(
                "max_connections should not exceed 100 for safety",
            ));
        }

        if self.connect_timeout.as_secs() == 0 {
            return Err(crate::error::SchemaLinkError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.query_timeout.as_secs() == 0 {
            return Err(crate::error::SchemaLinkError::configuration(
                "query_timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Creates a new connection config with safe defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Builder method to set the server instance.
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Builder method to set username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Builder method to add one extra template option.
    pub fn with_extra_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_options.insert(name.into(), value.into());
        self
    }

    /// Parses `name=value` pairs into the extra-option overlay.
    ///
    /// # Errors
    /// Returns a configuration error for a pair without `=` or with an
    /// empty name.
    pub fn with_extra_option_pairs<I, S>(mut self, pairs: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pair in pairs {
            let pair = pair.as_ref();
            let (name, value) = pair
                .split_once('=')
                .map(|(n, v)| (n.trim(), v.trim()))
                .filter(|(n, _)| !n.is_empty())
                .ok_or_else(|| {
                    crate::error::SchemaLinkError::configuration(format!(
                        "connection option '{}' must have the form name=value",
                        pair
                    ))
                })?;
            self.extra_options
                .insert(name.to_string(), value.to_string());
        }
        Ok(self)
    }
}
