//! Shell task bodies
//!
//! A [`ShellTask`] runs the compiled steps of one task: commands go through
//! the interpreter, `invoke` steps go back through the registry so they are
//! memoized and cycle-checked like any other call.

use crate::compiler::{CompiledTask, InvokeStep, Step};
use crate::engine::{TaskArgument, TaskBody, TaskContext};
use crate::error::InterpolationResult;
use crate::runner::{execute_command, interpolate, interpolate_strict, RunSettings};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ShellTask {
    steps: Vec<Step>,
    settings: Arc<RunSettings>,
}

impl ShellTask {
    pub fn new(steps: Vec<Step>, settings: Arc<RunSettings>) -> Self {
        ShellTask { steps, settings }
    }

    pub fn from_compiled(task: &CompiledTask, settings: Arc<RunSettings>) -> Self {
        ShellTask::new(task.steps.clone(), settings)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Bound arguments keyed by parameter name
    fn variables(&self, cx: &TaskContext<'_>) -> HashMap<String, String> {
        cx.node()
            .params
            .iter()
            .zip(cx.args())
            .map(|(param, value)| (param.name.clone(), value.to_string()))
            .collect()
    }

    fn invoke(
        &self,
        step: &InvokeStep,
        vars: &HashMap<String, String>,
    ) -> InterpolationResult<(String, Vec<TaskArgument>)> {
        let name = interpolate_strict(&step.task, vars)?;
        let args = step
            .args
            .iter()
            .map(|arg| interpolate(arg, vars).map(|a| TaskArgument::parse(&a)))
            .collect::<InterpolationResult<Vec<_>>>()?;
        Ok((name, args))
    }
}

impl TaskBody for ShellTask {
    fn run(&self, cx: &TaskContext<'_>) -> anyhow::Result<()> {
        self.settings.print_task_start(cx.node().identity.qualified());
        let vars = self.variables(cx);

        for step in &self.steps {
            match step {
                Step::Command(command) => execute_command(command, &self.settings, &vars)?,
                Step::Invoke(invoke) => {
                    let (name, args) = self.invoke(invoke, &vars)?;
                    cx.invoke(&name, &args)?;
                }
            }
        }

        self.settings.print_task_complete(cx.node().identity.qualified());
        Ok(())
    }
}
