//! Shell execution of compiled tasks
//!
//! This module runs the commands of compiled task plans and hands `invoke`
//! steps back to the engine.

pub mod command;
pub mod context;
pub mod interpolate;
pub mod task;

// Re-export main types
pub use command::*;
pub use context::*;
pub use interpolate::*;
pub use task::*;
