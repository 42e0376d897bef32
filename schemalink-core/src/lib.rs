//! Core library for schemalink.
//!
//! Resolves layered database-type descriptors, synthesizes connection strings
//! from their templates, and links foreign keys that cross from other schemas
//! into a home schema.
//!
//! # Pipeline
//! 1. [`descriptor::DescriptorStore`] finds a raw descriptor on disk or among
//!    the packaged `dbTypes`
//! 2. [`descriptor::DescriptorResolver`] applies `include.N` and `extends`
//! 3. [`connection::synthesize`] fills the descriptor's `connectionSpec`
//! 4. a [`metadata::MetadataSource`] reads the catalog
//! 5. [`linker`] records cross-schema edges on a [`models::SchemaGraph`]
//!
//! # Security Guarantees
//! - Passwords never pass through connection templates
//! - Connection strings are redacted before they are logged
//! - Catalog sessions are read-only by default

pub mod connection;
pub mod descriptor;
pub mod error;
pub mod linker;
pub mod logging;
pub mod metadata;
pub mod models;

// Re-export commonly used types
pub use connection::{ConnectionConfig, Credentials, build_connection_string, synthesize};
pub use descriptor::{DbOption, Descriptor, DescriptorResolver, DescriptorStore, extract_options};
pub use error::{Result, SchemaLinkError};
pub use linker::{
    ColumnExclusions, LinkPolicy, LinkSummary, link_foreign_keys, link_remote_tables,
    seed_home_schema,
};
pub use metadata::{ImportedKey, MetadataSource};
pub use models::{ForeignKeyEdge, Procedure, ProcedureSet, SchemaGraph, Table, TableRef};
