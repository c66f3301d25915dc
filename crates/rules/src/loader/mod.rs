//! Filesystem loader for YAML alert definitions.
//!
//! Scans the alerts directory recursively, parsing every `*.yml` / `*.yaml`
//! file into an [`AlertDefinition`](crate::schema::AlertDefinition). Parse
//! and validation errors are reported per file and never abort the scan.

mod core;
mod error;

#[cfg(test)]
mod tests;

pub use self::core::{AlertLoader, LoadReport};
pub use self::error::{LoadError, LoadResult, LoadStatus, Result};
