//! Converter Configuration Module
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `RDF2CSV_CONFIG` environment variable (path to TOML file)
//! 3. `rdf2csv.toml` in the current working directory
//! 4. Built-in defaults
//!
//! Command-line flags are applied on top of whichever file won.

mod converter_config;
pub mod defaults;
pub mod validation;

pub use converter_config::*;
