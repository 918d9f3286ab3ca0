//! Resolution of the final run configuration from, in order of precedence,
//! command-line flags, `-S key=value` overrides, the TOML file and built-in
//! defaults.

pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;
