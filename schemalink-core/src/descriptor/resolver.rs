//! `extends` / `include.N` inheritance for database-type descriptors.
//!
//! Resolution of a type proceeds in two steps over its raw key set:
//!
//! 1. **Includes.** `include.1`, `include.2`, ... are read in ascending order
//!    up to the first gap. Each has the form `otherType::otherKey`; the
//!    other type is resolved in full and its value for `otherKey` is copied
//!    in under the same key.
//! 2. **Extends.** If `extends = parentType` is present the parent is
//!    resolved in full and the child's keys are laid over it.
//!
//! Both directives are consumed, so a resolved descriptor holds only literal
//! keys. Every resolution path carries the chain of type names it is
//! currently inside; meeting a name already on the chain is a cycle.

use super::store::DescriptorStore;
use super::{Descriptor, DescriptorOrigin, EXTENDS_KEY, INCLUDE_PREFIX};
use crate::{Result, error::SchemaLinkError};
use std::collections::BTreeMap;

/// Separator between type and key in an include directive.
const INCLUDE_SEPARATOR: &str = "::";

/// Resolves descriptors loaded from a [`DescriptorStore`].
///
/// Holds no state between calls: parents and includes are resolved afresh
/// for every request and dropped once merged.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorResolver<'a> {
    store: &'a DescriptorStore,
}

impl<'a> DescriptorResolver<'a> {
    /// Creates a resolver reading from `store`.
    pub const fn new(store: &'a DescriptorStore) -> Self {
        Self { store }
    }

    /// Loads and fully resolves the descriptor for `type_name`.
    ///
    /// # Errors
    /// - `DescriptorNotFound` if this type, a parent or an included type
    ///   cannot be found
    /// - `MalformedDirective` for an include without `::`, an include naming
    ///   a key the other type lacks, or an empty `extends`
    /// - `CyclicDescriptor` if a type is reached again through its own chain
    pub fn resolve(&self, type_name: &str) -> Result<Descriptor> {
        let mut chain = Vec::new();
        self.resolve_in_chain(type_name.trim(), &mut chain)
    }

    fn resolve_in_chain(&self, type_name: &str, chain: &mut Vec<String>) -> Result<Descriptor> {
        if chain.iter().any(|seen| seen == type_name) {
            let mut cycle = chain.clone();
            cycle.push(type_name.to_string());
            tracing::error!("Cyclic database type chain: {}", cycle.join(" -> "));
            return Err(SchemaLinkError::CyclicDescriptor { chain: cycle });
        }

        chain.push(type_name.to_string());
        let resolved = self.resolve_loaded(type_name, chain);
        chain.pop();
        resolved
    }

    fn resolve_loaded(&self, type_name: &str, chain: &mut Vec<String>) -> Result<Descriptor> {
        let raw = self.store.load(type_name)?;
        let origin = raw.origin;
        let mut properties = raw.properties;

        self.process_includes(&mut properties, &origin, chain)?;
        self.process_extends(&mut properties, &origin, chain)?;
        drop_stray_includes(&mut properties, &origin);

        Ok(Descriptor::from_resolved(type_name, properties, origin))
    }

    /// Copies in the single key named by each `include.N` directive.
    fn process_includes(
        &self,
        properties: &mut BTreeMap<String, String>,
        origin: &DescriptorOrigin,
        chain: &mut Vec<String>,
    ) -> Result<()> {
        for index in 1usize.. {
            let Some(directive) = properties.remove(&format!("{}{}", INCLUDE_PREFIX, index)) else {
                break;
            };

            let (referenced_type, referenced_key) = directive
                .split_once(INCLUDE_SEPARATOR)
                .map(|(t, k)| (t.trim(), k.trim()))
                .filter(|(t, k)| !t.is_empty() && !k.is_empty())
                .ok_or_else(|| {
                    SchemaLinkError::malformed_directive(
                        origin.to_string(),
                        format!(
                            "include directive '{}' must have '{}' between dbType and key",
                            directive, INCLUDE_SEPARATOR
                        ),
                    )
                })?;

            let referenced = self.resolve_in_chain(referenced_type, chain)?;
            let value = referenced.get(referenced_key).ok_or_else(|| {
                SchemaLinkError::malformed_directive(
                    origin.to_string(),
                    format!(
                        "include.{} refers to key '{}' which database type '{}' does not define",
                        index, referenced_key, referenced_type
                    ),
                )
            })?;

            tracing::debug!(
                "Included '{}' from database type '{}' into {}",
                referenced_key,
                referenced_type,
                origin
            );
            properties.insert(referenced_key.to_string(), value.to_string());
        }

        Ok(())
    }

    /// Lays the child's keys over its fully resolved parent.
    fn process_extends(
        &self,
        properties: &mut BTreeMap<String, String>,
        origin: &DescriptorOrigin,
        chain: &mut Vec<String>,
    ) -> Result<()> {
        let Some(parent) = properties.remove(EXTENDS_KEY) else {
            return Ok(());
        };
        let parent = parent.trim();
        if parent.is_empty() {
            return Err(SchemaLinkError::malformed_directive(
                origin.to_string(),
                "extends directive names no database type",
            ));
        }

        let mut merged = self.resolve_in_chain(parent, chain)?.into_properties();
        tracing::debug!(
            "Database type from {} extends '{}' ({} inherited keys)",
            origin,
            parent,
            merged.len()
        );

        // Child keys win over inherited ones
        merged.append(properties);
        *properties = merged;
        Ok(())
    }
}

/// Removes `include.N` keys left behind a numbering gap.
fn drop_stray_includes(properties: &mut BTreeMap<String, String>, origin: &DescriptorOrigin) {
    properties.retain(|key, _| {
        let stray = key
            .strip_prefix(INCLUDE_PREFIX)
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
        if stray {
            tracing::warn!(
                "Ignoring '{}' in {}: include directives must be numbered from 1 without gaps",
                key,
                origin
            );
        }
        !stray
    });
}
