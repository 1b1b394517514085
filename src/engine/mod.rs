//! Task dependency and invocation engine
//!
//! Builds a validated task graph from analyzer output, binds executable bodies
//! to it, and invokes tasks with memoization and runtime cycle detection.

pub mod binder;
pub mod chain;
pub mod graph;
pub mod identity;
pub mod node;
pub mod registry;
pub mod session;
pub mod signature;

// Re-export main types
pub use binder::*;
pub use chain::*;
pub use graph::*;
pub use identity::*;
pub use node::*;
pub use registry::*;
pub use session::*;
pub use signature::*;
