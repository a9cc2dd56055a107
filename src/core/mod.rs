/// Core Module for db-bridge
///
/// Shared infrastructure used by every other module: the crate-wide error
/// type and Result alias.
pub mod error;

// Re-export commonly used types for convenience
pub use error::{BridgeError, DriverError, Result};
