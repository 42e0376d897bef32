//! Layered lookup of raw database-type descriptors.
//!
//! Lookup order for a type name, first match wins:
//! 1. a file named exactly as the type, relative to the working directory
//! 2. `<type>.properties` in the working directory
//! 3. the packaged resource `<type>.properties`
//! 4. the packaged resource `dbTypes/<type>.properties`
//!
//! The store does no inheritance processing; see [`super::DescriptorResolver`].

use super::DescriptorOrigin;
use super::properties::parse_properties;
use crate::{Result, error::SchemaLinkError};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory packaged descriptors live under.
pub const PACKAGED_DIR: &str = "dbTypes";

/// Descriptors compiled into the library.
const BUILTIN_DESCRIPTORS: &[(&str, &str)] = &[
    ("dbTypes/pgsql.properties", include_str!("../../dbTypes/pgsql.properties")),
    ("dbTypes/pgsql-ssl.properties", include_str!("../../dbTypes/pgsql-ssl.properties")),
    ("dbTypes/mysql.properties", include_str!("../../dbTypes/mysql.properties")),
    ("dbTypes/mariadb.properties", include_str!("../../dbTypes/mariadb.properties")),
    ("dbTypes/mssql.properties", include_str!("../../dbTypes/mssql.properties")),
    ("dbTypes/mssql-named.properties", include_str!("../../dbTypes/mssql-named.properties")),
    ("dbTypes/sqlite.properties", include_str!("../../dbTypes/sqlite.properties")),
];

/// A descriptor exactly as loaded, directives still in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDescriptor {
    /// Type name the descriptor was requested under
    pub name: String,
    /// Properties as read from the file
    pub properties: BTreeMap<String, String>,
    /// Where the file was found
    pub origin: DescriptorOrigin,
}

/// Finds descriptors on disk and among packaged resources.
#[derive(Debug, Clone)]
pub struct DescriptorStore {
    working_dir: PathBuf,
    packaged: BTreeMap<String, Cow<'static, str>>,
}

impl Default for DescriptorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorStore {
    /// Creates a store over the current directory and the built-in descriptors.
    pub fn new() -> Self {
        let packaged = BUILTIN_DESCRIPTORS
            .iter()
            .map(|(path, text)| ((*path).to_string(), Cow::Borrowed(*text)))
            .collect();
        Self {
            working_dir: PathBuf::from("."),
            packaged,
        }
    }

    /// Creates a store with no packaged resources at all.
    pub fn empty() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            packaged: BTreeMap::new(),
        }
    }

    /// Builder method to set the directory file lookups are relative to.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Builder method to register an additional packaged resource.
    ///
    /// `path` is the resource path, e.g. `dbTypes/custom.properties`.
    pub fn with_packaged(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.packaged.insert(path.into(), Cow::Owned(text.into()));
        self
    }

    /// Directory searched before the packaged types.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Names of the database types available as packaged resources.
    pub fn packaged_types(&self) -> Vec<String> {
        let prefix = format!("{}/", PACKAGED_DIR);
        let mut names: Vec<String> = self
            .packaged
            .keys()
            .filter_map(|path| {
                let file = path.strip_prefix(&prefix).unwrap_or(path);
                file.strip_suffix(".properties")
                    .filter(|name| !name.contains('/'))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Loads the raw descriptor for `type_name`.
    ///
    /// # Errors
    /// `DescriptorNotFound` when no strategy matches, `Io` when a matching
    /// file cannot be read, `Configuration` when its contents do not parse.
    pub fn load(&self, type_name: &str) -> Result<RawDescriptor> {
        for candidate in [
            self.working_dir.join(type_name),
            self.working_dir.join(format!("{}.properties", type_name)),
        ] {
            if candidate.is_file() {
                return self.load_file(type_name, &candidate);
            }
        }

        for resource in [
            format!("{}.properties", type_name),
            format!("{}/{}.properties", PACKAGED_DIR, type_name),
        ] {
            if let Some(text) = self.packaged.get(&resource) {
                tracing::debug!(
                    "Loading database type '{}' from packaged resource {}",
                    type_name,
                    resource
                );
                let properties = parse_properties(text, &resource)?;
                return Ok(RawDescriptor {
                    name: type_name.to_string(),
                    properties,
                    origin: DescriptorOrigin::Packaged(resource),
                });
            }
        }

        tracing::error!(
            "Failed to find properties for database type '{}' in file '{}' or '{}.properties' \
             under {}, and no packaged version found",
            type_name,
            type_name,
            type_name,
            self.working_dir.display()
        );
        Err(SchemaLinkError::descriptor_not_found(type_name))
    }

    fn load_file(&self, type_name: &str, path: &Path) -> Result<RawDescriptor> {
        let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        tracing::debug!(
            "Loading database type '{}' from {}",
            type_name,
            absolute.display()
        );

        let text = std::fs::read_to_string(path).map_err(|e| SchemaLinkError::Io {
            context: format!("Failed to read database type file {}", absolute.display()),
            source: e,
        })?;
        let properties = parse_properties(&text, &absolute.display().to_string())?;

        Ok(RawDescriptor {
            name: type_name.to_string(),
            properties,
            origin: DescriptorOrigin::File(absolute),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types_listed() {
        let types = DescriptorStore::new().packaged_types();
        for expected in ["mariadb", "mssql", "mssql-named", "mysql", "pgsql", "pgsql-ssl", "sqlite"] {
            assert!(types.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn test_builtins_parse() {
        let store = DescriptorStore::new();
        for name in store.packaged_types() {
            let raw = store.load(&name).unwrap();
            assert!(!raw.properties.is_empty(), "{} is empty", name);
        }
    }

    #[test]
    fn test_packaged_root_beats_dbtypes_dir() {
        let store = DescriptorStore::empty()
            .with_packaged("custom.properties", "source=root\n")
            .with_packaged("dbTypes/custom.properties", "source=dbTypes\n");

        let raw = store.load("custom").unwrap();
        assert_eq!(raw.properties["source"], "root");
        assert_eq!(
            raw.origin,
            DescriptorOrigin::Packaged("custom.properties".to_string())
        );
    }

    #[test]
    fn test_working_dir_file_beats_packaged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pgsql.properties"), "source=disk\n").unwrap();

        let store = DescriptorStore::new().with_working_dir(dir.path());
        let raw = store.load("pgsql").unwrap();
        assert_eq!(raw.properties["source"], "disk");
        assert!(matches!(raw.origin, DescriptorOrigin::File(_)));
    }

    #[test]
    fn test_exact_filename_beats_properties_suffix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vendor.cfg"), "source=exact\n").unwrap();
        std::fs::write(dir.path().join("vendor.cfg.properties"), "source=suffix\n").unwrap();

        let store = DescriptorStore::empty().with_working_dir(dir.path());
        assert_eq!(store.load("vendor.cfg").unwrap().properties["source"], "exact");
    }

    #[test]
    fn test_directory_named_like_type_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("pgsql")).unwrap();

        let store = DescriptorStore::new().with_working_dir(dir.path());
        let raw = store.load("pgsql").unwrap();
        assert!(matches!(raw.origin, DescriptorOrigin::Packaged(_)));
    }

    #[test]
    fn test_unknown_type_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DescriptorStore::new().with_working_dir(dir.path());
        let err = store.load("nosuchdb").unwrap_err();
        assert!(matches!(
            err,
            SchemaLinkError::DescriptorNotFound { ref type_name } if type_name == "nosuchdb"
        ));
    }
}
