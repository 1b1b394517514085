//! Task registry and invoker
//!
//! A registry owns one build generation: the task graph, the executable body
//! bound to every node, and the memoization records of `step` tasks. Records
//! live and die with the registry, so replacing it starts a fresh session.
//!
//! A record holds the outcome of the one execution for its argument set.
//! Concurrent callers wait for that execution; later callers see its result,
//! so a failed step keeps failing instead of reading as done.

use crate::engine::binder::bind_arguments;
use crate::engine::chain::InvocationChain;
use crate::engine::graph::TaskGraph;
use crate::engine::node::{NodeId, TaskArgument, TaskNode, Value};
use crate::error::{into_invocation_error, Result, StepwiseError, StructuralError};
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Executable entry point of a task
pub trait TaskBody: Send + Sync {
    fn run(&self, cx: &TaskContext<'_>) -> anyhow::Result<()>;
}

impl<F> TaskBody for F
where
    F: Fn(&TaskContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn run(&self, cx: &TaskContext<'_>) -> anyhow::Result<()> {
        self(cx)
    }
}

/// Wrap a closure as a task body, pinning down its signature for inference
pub fn task_fn<F>(f: F) -> F
where
    F: Fn(&TaskContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    f
}

/// What a running task body can see: its bound arguments and a handle for
/// invoking other tasks through the same registry.
pub struct TaskContext<'r> {
    registry: &'r Registry,
    node: NodeId,
    args: &'r [Value],
    chain: InvocationChain,
}

impl<'r> TaskContext<'r> {
    pub fn node(&self) -> &'r TaskNode {
        self.registry.graph.node(self.node)
    }

    pub fn name(&self) -> &'r str {
        self.node().name()
    }

    /// Bound values, one per declared parameter
    pub fn args(&self) -> &'r [Value] {
        self.args
    }

    /// Look up a bound value by parameter name, ignoring case
    pub fn arg(&self, name: &str) -> Option<&'r Value> {
        let args = self.args;
        self.node()
            .params
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
            .map(|i| &args[i])
    }

    pub fn chain(&self) -> &InvocationChain {
        &self.chain
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Invoke another task from inside this body. Bare names resolve from
    /// this task's namespace outward. The call extends the current invocation
    /// chain, so runtime cycles are caught.
    pub fn invoke(&self, name: &str, args: &[TaskArgument]) -> Result<()> {
        let id = self
            .registry
            .graph
            .find_from(self.node().identity.scope(), name)
            .ok_or_else(|| StepwiseError::TaskNotFound(name.to_string()))?;
        self.registry.invoke_with_chain(id, args, &self.chain)
    }
}

/// Registry of one build generation
pub struct Registry {
    graph: TaskGraph,
    bodies: Vec<Arc<dyn TaskBody>>,
    records: Vec<DashMap<Vec<Value>, Arc<OnceLock<StepOutcome>>>>,
}

/// Result of a step execution; a failure keeps its message for replay
type StepOutcome = std::result::Result<(), String>;

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("tasks", &self.graph.len())
            .finish()
    }
}

/// Binds executable bodies to the nodes of a graph
pub struct RegistryBuilder {
    graph: TaskGraph,
    bodies: Vec<Option<Arc<dyn TaskBody>>>,
}

impl RegistryBuilder {
    /// Bind a body to a task by name
    pub fn bind(mut self, name: &str, body: impl TaskBody + 'static) -> Result<Self> {
        let id = self
            .graph
            .find(name)
            .ok_or_else(|| StepwiseError::TaskNotFound(name.to_string()))?;
        self.bodies[id.0] = Some(Arc::new(body));
        Ok(self)
    }

    /// Bind a shared body to a node
    pub fn bind_node(&mut self, id: NodeId, body: Arc<dyn TaskBody>) {
        self.bodies[id.0] = Some(body);
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Finish the registry; every node must have a body
    pub fn build(self) -> Result<Registry> {
        let mut bodies = Vec::with_capacity(self.bodies.len());
        for (i, body) in self.bodies.into_iter().enumerate() {
            match body {
                Some(body) => bodies.push(body),
                None => {
                    return Err(StructuralError::UnboundTask {
                        task: self.graph.node(NodeId(i)).name().to_string(),
                    }
                    .into())
                }
            }
        }

        let records = (0..bodies.len()).map(|_| DashMap::new()).collect();
        Ok(Registry {
            graph: self.graph,
            bodies,
            records,
        })
    }
}

impl Registry {
    pub fn builder(graph: TaskGraph) -> RegistryBuilder {
        let bodies = (0..graph.len()).map(|_| None).collect();
        RegistryBuilder { graph, bodies }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Case-insensitive lookup of a task by qualified name
    pub fn find_task(&self, name: &str) -> Result<&TaskNode> {
        self.resolve(name).map(|id| self.graph.node(id))
    }

    fn resolve(&self, name: &str) -> Result<NodeId> {
        self.graph
            .find(name)
            .ok_or_else(|| StepwiseError::TaskNotFound(name.to_string()))
    }

    /// Invoke a task by name as a new top-level call
    pub fn invoke(&self, name: &str, args: &[TaskArgument]) -> Result<()> {
        let id = self.resolve(name)?;
        self.invoke_with_chain(id, args, &InvocationChain::start())
    }

    /// Number of distinct argument sets a step task has executed with
    pub fn executed_records(&self, name: &str) -> Result<usize> {
        self.resolve(name).map(|id| {
            self.records[id.0]
                .iter()
                .filter(|record| record.value().get().is_some())
                .count()
        })
    }

    fn invoke_with_chain(
        &self,
        id: NodeId,
        args: &[TaskArgument],
        chain: &InvocationChain,
    ) -> Result<()> {
        let node = self.graph.node(id);

        if chain.current() == Some(id) {
            return Err(StructuralError::RecursiveCall {
                task: node.name().to_string(),
            }
            .into());
        }
        let chain = chain.append(id, node.name())?;

        let values = bind_arguments(node, args)?;

        for dep in &node.dependencies {
            self.invoke_with_chain(dep.target, &dep.args, &chain)?;
        }

        if !node.is_step() {
            return self.run_body(id, &values, chain);
        }

        let record = Arc::clone(self.records[id.0].entry(values.clone()).or_default().value());
        let mut ran = false;
        let mut failure = None;
        let outcome = record.get_or_init(|| {
            ran = true;
            self.run_body(id, &values, chain).map_err(|e| {
                let reason = e.to_string();
                failure = Some(e);
                reason
            })
        });

        if let Some(error) = failure {
            return Err(error);
        }
        match outcome {
            Ok(()) => {
                if !ran {
                    debug!(task = %node.name(), status = "skipped", "step already executed with these arguments");
                }
                Ok(())
            }
            Err(reason) => Err(StepwiseError::StepFailed {
                task: node.name().to_string(),
                reason: reason.clone(),
            }),
        }
    }

    fn run_body(&self, id: NodeId, values: &[Value], chain: InvocationChain) -> Result<()> {
        let node = self.graph.node(id);
        info!(task = %node.name(), depth = chain.len(), "running task");
        let cx = TaskContext {
            registry: self,
            node: id,
            args: values,
            chain,
        };
        self.bodies[id.0]
            .run(&cx)
            .map_err(|e| into_invocation_error(node.name(), e))
    }
}
