//! Stepwise - a YAML task runner with memoized steps and a compiled-plan cache
//!
//! Tasks declared in a `stepwise.yml` file form a validated dependency graph.
//! Invoking a task walks its dependencies first; tasks marked as steps run at
//! most once per distinct argument set within a session. Compiled task plans
//! are cached on disk, keyed by script content, substitutions and build mode.

// Public modules
pub mod cache;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod runner;

// Re-export commonly used types
pub use error::{Result, StepwiseError};

/// Current version of Stepwise
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
