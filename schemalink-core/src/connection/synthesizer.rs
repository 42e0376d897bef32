//! Fills a descriptor's connection template from caller parameters.
//!
//! Every declared option is resolved, first match wins:
//! 1. the fixed [`ConnectionConfig`] fields `host`, `port`, `database` and
//!    `instance`, matched case-insensitively against the option name, with
//!    `port` falling back to the descriptor's `default-port`
//! 2. the extra-option overlay, matched case-sensitively
//!
//! An option neither source supplies is a [`SchemaLinkError::MissingRequiredOption`].

use super::ConnectionConfig;
use crate::descriptor::{DbOption, Descriptor};
use crate::error::{SchemaLinkError, redact_database_url};
use crate::Result;
use std::collections::BTreeMap;

/// Resolves a value for every option, in template order.
///
/// # Errors
/// `MissingRequiredOption` naming the first option without a value.
pub fn resolve_option_values(
    descriptor: &Descriptor,
    options: &[DbOption],
    config: &ConnectionConfig,
) -> Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();

    for option in options {
        let value = fixed_value(option, descriptor, config)
            .or_else(|| config.extra_options.get(&option.name).cloned())
            .ok_or_else(|| SchemaLinkError::missing_option(&option.name))?;
        values.insert(option.name.clone(), value);
    }

    Ok(values)
}

fn fixed_value(
    option: &DbOption,
    descriptor: &Descriptor,
    config: &ConnectionConfig,
) -> Option<String> {
    if option.is_named("host") {
        config.host.clone()
    } else if option.is_named("port") {
        config
            .port
            .map(|port| port.to_string())
            .or_else(|| descriptor.default_port().map(str::to_string))
    } else if option.is_named("database") {
        config.database.clone()
    } else if option.is_named("instance") {
        config.instance.clone()
    } else {
        None
    }
}

/// Builds the connection string for `descriptor` from `options` and `config`.
///
/// Every occurrence of each `<name>` placeholder is replaced in a single pass,
/// so a value that itself contains `<...>` text is inserted verbatim.
///
/// # Errors
/// `Configuration` when the descriptor has no `connectionSpec`,
/// `MissingRequiredOption` when an option has no value.
pub fn synthesize(
    descriptor: &Descriptor,
    options: &[DbOption],
    config: &ConnectionConfig,
) -> Result<String> {
    let template = descriptor.connection_spec().ok_or_else(|| {
        SchemaLinkError::configuration(format!(
            "database type '{}' does not define a connectionSpec",
            descriptor.name()
        ))
    })?;

    let values = resolve_option_values(descriptor, options, config)?;
    Ok(substitute(template, &values))
}

/// Extracts the descriptor's options and synthesizes its connection string.
///
/// The result is logged at debug level with any password masked.
pub fn build_connection_string(
    descriptor: &Descriptor,
    config: &ConnectionConfig,
) -> Result<String> {
    let options = descriptor.options();
    let connection_string = synthesize(descriptor, &options, config)?;
    tracing::debug!(
        "Connection string for '{}': {}",
        descriptor.name(),
        redact_database_url(&connection_string)
    );
    Ok(connection_string)
}

fn substitute(template: &str, values: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open.saturating_add(1)..];

        // The placeholder body ends at the next '>' unless another '<' comes first
        let close = after
            .find(['<', '>'])
            .filter(|&end| after[end..].starts_with('>'));

        match close.and_then(|end| values.get(&after[..end]).map(|v| (end, v))) {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end.saturating_add(1)..];
            }
            None => {
                out.push('<');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
