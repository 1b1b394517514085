//! Script parsing and analysis
//!
//! This module handles discovery and parsing of stepwise.yml files and
//! reports the declared tasks and their calls to the engine.

pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use parse::*;
pub use schema::*;
pub use types::*;
