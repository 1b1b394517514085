//! Runtime invocation chain
//!
//! An immutable, append-only record of the tasks currently being entered.
//! Appending returns a new chain that shares its tail with the old one, so
//! chains can be handed to concurrent workers without copying or locking.

use crate::engine::node::NodeId;
use crate::error::StructuralError;
use std::sync::Arc;

#[derive(Debug)]
struct Link {
    node: NodeId,
    name: String,
    parent: Option<Arc<Link>>,
}

/// The call path from the outermost invocation to the current task
#[derive(Debug, Clone, Default)]
pub struct InvocationChain {
    head: Option<Arc<Link>>,
    len: usize,
}

impl InvocationChain {
    /// The empty chain
    pub fn start() -> Self {
        InvocationChain::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The innermost task, if any
    pub fn current(&self) -> Option<NodeId> {
        self.head.as_ref().map(|link| link.node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.links().any(|link| link.node == node)
    }

    /// Derive a chain with `node` entered.
    ///
    /// Fails with a cyclic-dependency error when `node` is already on the
    /// chain; the error path runs from its first occurrence to the repeat.
    pub fn append(&self, node: NodeId, name: &str) -> Result<InvocationChain, StructuralError> {
        if self.contains(node) {
            let mut path: Vec<String> = Vec::new();
            for link in self.links() {
                path.push(link.name.clone());
                if link.node == node {
                    break;
                }
            }
            path.reverse();
            path.push(name.to_string());
            return Err(StructuralError::CyclicDependency { path });
        }

        Ok(InvocationChain {
            head: Some(Arc::new(Link {
                node,
                name: name.to_string(),
                parent: self.head.clone(),
            })),
            len: self.len + 1,
        })
    }

    /// Task names from outermost to innermost
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.links().map(|link| link.name.clone()).collect();
        names.reverse();
        names
    }

    fn links(&self) -> impl Iterator<Item = &Link> {
        std::iter::successors(self.head.as_deref(), |link| link.parent.as_deref())
    }
}
