//! Task graph construction
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`]. Every
//! edge is checked for cycles before it is inserted, so the graph is acyclic
//! at all times.

use crate::engine::identity::{candidate_keys, Scope};
use crate::engine::node::{Dependency, NodeId, TaskArgument, TaskNode};
use crate::engine::signature::{validate_signature, DeclaredCall, EnumCatalog, TaskDescriptor};
use crate::error::{StructuralError, StructuralResult};
use std::collections::{HashMap, HashSet};

/// A validated, acyclic task graph for one build
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    index: HashMap<String, NodeId>,
}

impl TaskGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TaskNode {
        &self.nodes[id.0]
    }

    /// Case-insensitive lookup by qualified name
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.index
            .get(&crate::engine::identity::normalize_key(name))
            .copied()
    }

    /// Resolve a call written inside `scope`, trying enclosing scopes
    pub fn find_from(&self, scope: &Scope, reference: &str) -> Option<NodeId> {
        candidate_keys(scope, reference)
            .iter()
            .find_map(|key| self.index.get(key).copied())
    }

    /// All nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &TaskNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }
}

/// Incrementally builds a [`TaskGraph`], validating as it goes
pub struct GraphBuilder {
    enums: EnumCatalog,
    nodes: Vec<TaskNode>,
    declared: Vec<TaskDescriptor>,
    index: HashMap<String, NodeId>,
}

impl GraphBuilder {
    pub fn new(enums: EnumCatalog) -> Self {
        GraphBuilder {
            enums,
            nodes: Vec::new(),
            declared: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Create the node for a descriptor, or reuse the existing node if the
    /// very same declaration was reported again.
    pub fn declare(&mut self, descriptor: &TaskDescriptor) -> StructuralResult<NodeId> {
        let key = descriptor.identity.key().to_string();

        if let Some(&existing) = self.index.get(&key) {
            let previous = &self.declared[existing.0];
            if previous == descriptor {
                return Ok(existing);
            }

            let name = descriptor.identity.qualified().to_string();
            let existing_name = previous.identity.qualified().to_string();
            if name != existing_name {
                return Err(StructuralError::DuplicateTaskCase {
                    name,
                    existing: existing_name,
                });
            }
            if previous.raw_signature() != descriptor.raw_signature() {
                return Err(StructuralError::DuplicateTaskOverload { name });
            }
            return Err(StructuralError::DuplicateTask { name });
        }

        let params = validate_signature(descriptor, &self.enums)?;
        let id = NodeId(self.nodes.len());

        self.nodes.push(TaskNode {
            identity: descriptor.identity.clone(),
            params,
            summary: descriptor.summary.clone(),
            idempotency: descriptor.idempotency,
            dependencies: Vec::new(),
            origin: descriptor.origin.clone(),
        });
        self.declared.push(descriptor.clone());
        self.index.insert(key, id);

        Ok(id)
    }

    /// Resolve a declared call made by `from` and add the edge
    pub fn connect(&mut self, from: NodeId, call: &DeclaredCall) -> StructuralResult<()> {
        let scope = self.nodes[from.0].identity.scope().clone();
        let target = candidate_keys(&scope, &call.target)
            .iter()
            .find_map(|key| self.index.get(key).copied())
            .ok_or_else(|| StructuralError::UnknownTask {
                task: self.nodes[from.0].name().to_string(),
                dependency: call.target.clone(),
            })?;

        self.add_edge(from, target, call.args.clone())
    }

    /// Add `from depends-on to`, refusing self-loops and cycles
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        args: Vec<TaskArgument>,
    ) -> StructuralResult<()> {
        if from == to {
            return Err(StructuralError::RecursiveCall {
                task: self.nodes[from.0].name().to_string(),
            });
        }

        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if self.find_path(to, from, &mut visited, &mut path) {
            let mut names = vec![self.nodes[from.0].name().to_string()];
            names.extend(path.iter().map(|id| self.nodes[id.0].name().to_string()));
            return Err(StructuralError::CyclicDependency { path: names });
        }

        self.nodes[from.0]
            .dependencies
            .push(Dependency { target: to, args });
        Ok(())
    }

    /// Depth-first search for `target` starting at `current`. On success
    /// `path` holds the walk from `current` to `target` inclusive.
    fn find_path(
        &self,
        current: NodeId,
        target: NodeId,
        visited: &mut HashSet<NodeId>,
        path: &mut Vec<NodeId>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if visited.insert(current) {
            for dep in &self.nodes[current.0].dependencies {
                if self.find_path(dep.target, target, visited, path) {
                    return true;
                }
            }
        }
        path.pop();
        false
    }

    pub fn finish(self) -> TaskGraph {
        TaskGraph {
            nodes: self.nodes,
            index: self.index,
        }
    }
}

/// Build and validate a graph from analyzer output.
///
/// All tasks are declared first so calls may refer to tasks declared later in
/// the script; edges are then added in declaration order.
pub fn build_graph(descriptors: &[TaskDescriptor], enums: EnumCatalog) -> StructuralResult<TaskGraph> {
    let mut builder = GraphBuilder::new(enums);

    let ids = descriptors
        .iter()
        .map(|d| builder.declare(d))
        .collect::<StructuralResult<Vec<_>>>()?;

    let mut connected = HashSet::new();
    for (descriptor, id) in descriptors.iter().zip(ids) {
        if !connected.insert(id) {
            continue;
        }
        for call in &descriptor.calls {
            builder.connect(id, call)?;
        }
    }

    Ok(builder.finish())
}
