//! db-bridge: a thin convenience layer over MySQL, SQLite and PostgreSQL
//! client libraries.
//!
//! Credentials resolve from layered sources (explicit record, environment
//! variables, INI profile file), a connection opens with the matching
//! driver, one statement executes with optional parameter binding, and
//! rows come back as ordered mappings or positional tuples. Two column
//! lookup helpers compose SELECTs on top of the same primitive.
//!
//! Everything is synchronous and blocking; each call opens and closes its
//! own connection.

// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod bridge;
pub mod config;
pub mod helpers;
pub mod query;

// Re-export the public surface at the crate root
pub use crate::config::{load_config, resolve, Credentials, Driver};
pub use crate::core::{BridgeError, DriverError, Result};
pub use crate::helpers::{
    get_column_values, get_column_values_regexp, FirstMatch, Lookup, LookupOptions,
    RegexpOptions, RowPicker,
};
pub use crate::query::{run_sql, Row, SqlOutput, SqlRequest, Value};
