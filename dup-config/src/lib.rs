//! Configuration management for the duplication metadata service.
//!
//! Provides environment detection, configuration loading from YAML files and shared
//! configuration types used by the duplication state machine and its persistence worker.

mod environment;
mod load;
pub mod shared;

pub use environment::*;
pub use load::*;
