//! Connection parameters and connection-string synthesis.

pub mod config;
pub mod credentials;
pub mod synthesizer;

pub use config::ConnectionConfig;
pub use credentials::Credentials;
pub use synthesizer::{build_connection_string, resolve_option_values, synthesize};
