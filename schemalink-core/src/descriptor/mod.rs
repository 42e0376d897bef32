//! Database-type descriptors.
//!
//! A descriptor is a flat key/value bundle describing one database vendor:
//! its connection-string template (`connectionSpec`), the descriptions of
//! the template's parameters, an optional `default-port`, and vendor
//! capabilities such as `supportsAlterProc`.
//!
//! # Module Structure
//! - `properties`: reader for the `.properties` file format
//! - `store`: layered lookup of raw descriptors by type name
//! - `resolver`: `extends` / `include.N` inheritance
//! - `options`: connection-template parameter discovery

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub mod options;
pub mod properties;
pub mod resolver;
pub mod store;

pub use options::{DbOption, extract_options, placeholder_names};
pub use resolver::DescriptorResolver;
pub use store::{DescriptorStore, RawDescriptor};

/// Key holding the connection-string template.
pub const CONNECTION_SPEC_KEY: &str = "connectionSpec";
/// Key holding the port used when the caller supplies none.
pub const DEFAULT_PORT_KEY: &str = "default-port";
/// Key holding the "alter procedure" capability flag.
pub const SUPPORTS_ALTER_PROC_KEY: &str = "supportsAlterProc";
/// Key holding a human-readable description of the database type.
pub const DESCRIPTION_KEY: &str = "description";
/// Inheritance directive key.
pub const EXTENDS_KEY: &str = "extends";
/// Prefix of the numbered include directives.
pub const INCLUDE_PREFIX: &str = "include.";

/// Where a descriptor was loaded from. Diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DescriptorOrigin {
    /// A file on disk (absolute path when it could be determined)
    File(PathBuf),
    /// A resource compiled into the library
    Packaged(String),
}

impl fmt::Display for DescriptorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Packaged(path) => write!(f, "[{}]/{}", env!("CARGO_PKG_NAME"), path),
        }
    }
}

/// A fully resolved database-type descriptor.
///
/// Only literal keys remain: `extends` and `include.N` have been consumed by
/// the [`DescriptorResolver`], which is the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    name: String,
    properties: BTreeMap<String, String>,
    alter_supported: bool,
    origin: DescriptorOrigin,
}

impl Descriptor {
    pub(crate) fn from_resolved(
        name: impl Into<String>,
        properties: BTreeMap<String, String>,
        origin: DescriptorOrigin,
    ) -> Self {
        // Parsed like java.lang.Boolean: only "true", in any case, is true
        let alter_supported = properties
            .get(SUPPORTS_ALTER_PROC_KEY)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        Self {
            name: name.into(),
            properties,
            alter_supported,
            origin,
        }
    }

    /// The type name this descriptor was requested under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of a resolved property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Every resolved property, directives removed.
    pub const fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub(crate) fn into_properties(self) -> BTreeMap<String, String> {
        self.properties
    }

    /// Whether the vendor supports altering stored procedures in place.
    pub const fn alter_supported(&self) -> bool {
        self.alter_supported
    }

    /// Where the descriptor's own file was found.
    pub const fn origin(&self) -> &DescriptorOrigin {
        &self.origin
    }

    /// The `connectionSpec` template, if any.
    pub fn connection_spec(&self) -> Option<&str> {
        self.get(CONNECTION_SPEC_KEY)
    }

    /// The trimmed `default-port`, absent when blank.
    pub fn default_port(&self) -> Option<&str> {
        self.get(DEFAULT_PORT_KEY)
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Human-readable description of the vendor.
    pub fn description(&self) -> Option<&str> {
        self.get(DESCRIPTION_KEY)
    }

    /// The connection parameters this descriptor's template declares.
    pub fn options(&self) -> Vec<DbOption> {
        extract_options(self)
    }

    /// Human-readable usage: the type and each option with its description.
    pub fn usage(&self) -> String {
        let mut out = format!(
            " {} - {}\n",
            self.name,
            self.description().unwrap_or("(no description)")
        );
        for option in self.options() {
            match &option.description {
                Some(description) => {
                    out.push_str(&format!("   {}:   \t{}\n", option.name, description));
                }
                None => out.push_str(&format!("   {}:\n", option.name)),
            }
        }
        out
    }
}
