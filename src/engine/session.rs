//! Process-scoped handle to the current registry
//!
//! Each successful build produces a new [`Registry`]. Installing it swaps the
//! previous generation out; callers still holding the old `Arc` finish their
//! work against it, and its memoization records are dropped with it.

use crate::engine::node::TaskArgument;
use crate::engine::registry::Registry;
use crate::error::{ConfigError, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Holder of the current build generation
#[derive(Debug, Default)]
pub struct Session {
    current: RwLock<Option<Arc<Registry>>>,
    generation: RwLock<u64>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    /// Install a freshly built registry, returning the one it replaces
    pub fn install(&self, registry: Registry) -> Option<Arc<Registry>> {
        let mut generation = self.generation.write();
        *generation += 1;
        debug!(generation = *generation, tasks = registry.graph().len(), "installing registry");
        self.current.write().replace(Arc::new(registry))
    }

    /// Number of registries installed so far
    pub fn generation(&self) -> u64 {
        *self.generation.read()
    }

    /// The current registry
    pub fn registry(&self) -> Result<Arc<Registry>> {
        self.current
            .read()
            .clone()
            .ok_or_else(|| ConfigError::Invalid("no script has been built yet".to_string()).into())
    }

    /// Invoke a task on the current registry
    pub fn invoke(&self, name: &str, args: &[TaskArgument]) -> Result<()> {
        self.registry()?.invoke(name, args)
    }
}
