//! Script analysis
//!
//! Walks a loaded script, including every sibling file and nested namespace,
//! and reports one [`TaskDescriptor`] per declared task together with the
//! declared enum types and external tool references.

use crate::config::parse::ScriptSource;
use crate::config::types::{Namespace, Run, Scalar, Task};
use crate::engine::{
    DeclaredCall, EnumCatalog, EnumType, Idempotency, ParamSpec, Scope, TaskArgument,
    TaskDescriptor, TaskIdentity, SCOPE_SEPARATOR,
};
use crate::error::{ConfigError, ConfigResult};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Everything the analyzer extracted from a script
#[derive(Debug, Clone)]
pub struct Analysis {
    pub name: Option<String>,
    pub usage: Option<String>,
    pub interpreter: Option<Vec<String>>,
    pub requires: Vec<String>,
    pub enums: EnumCatalog,
    pub descriptors: Vec<TaskDescriptor>,
    /// Keys of tasks hidden from listings
    pub hidden: HashSet<String>,
}

/// Visit every task in every loaded file, outer namespaces first
pub fn for_each_task<F, E>(source: &ScriptSource, mut f: F) -> Result<(), E>
where
    F: FnMut(&Scope, &str, &Task, &Path) -> Result<(), E>,
    E: From<ConfigError>,
{
    fn walk<F, E>(
        scope: &Scope,
        tasks: &indexmap::IndexMap<String, Task>,
        namespaces: &indexmap::IndexMap<String, Namespace>,
        path: &Path,
        f: &mut F,
    ) -> Result<(), E>
    where
        F: FnMut(&Scope, &str, &Task, &Path) -> Result<(), E>,
        E: From<ConfigError>,
    {
        for (name, task) in tasks {
            validate_name("task", name)?;
            f(scope, name, task, path)?;
        }
        for (name, namespace) in namespaces {
            validate_name("namespace", name)?;
            walk(
                &scope.child(name),
                &namespace.tasks,
                &namespace.namespaces,
                path,
                f,
            )?;
        }
        Ok(())
    }

    for file in source.files() {
        walk(
            &Scope::root(),
            &file.script.tasks,
            &file.script.namespaces,
            &file.path,
            &mut f,
        )?;
    }
    Ok(())
}

fn validate_name(kind: &str, name: &str) -> ConfigResult<()> {
    if name.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{} names may not be empty", kind)));
    }
    if name.contains(SCOPE_SEPARATOR) {
        return Err(ConfigError::Invalid(format!(
            "{} name '{}' may not contain '{}'",
            kind, name, SCOPE_SEPARATOR
        )));
    }
    Ok(())
}

/// Convert written arguments into task arguments
pub fn call_arguments(args: &[Scalar]) -> Vec<TaskArgument> {
    args.iter().map(|a| TaskArgument::parse(&a.0)).collect()
}

/// Analyze a loaded script
/// `args:` beside `task:` belongs to that one task and cannot also be given inline
fn validate_run_items(name: &str, task: &Task) -> ConfigResult<()> {
    for run in &task.run {
        let Run::Complex(item) = run else { continue };
        if item.args.is_empty() {
            continue;
        }
        if item.task.len() != 1 {
            return Err(ConfigError::Invalid(format!(
                "task '{}': a run item with args needs exactly one task, found {}",
                name,
                item.task.len()
            )));
        }
        if !item.task[0].args().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "task '{}': arguments for '{}' are given twice",
                name,
                item.task[0].name()
            )));
        }
    }
    Ok(())
}

pub fn analyze(source: &ScriptSource) -> ConfigResult<Analysis> {
    let main = source.main();

    let mut enums = EnumCatalog::new();
    let mut enum_origins: HashMap<String, String> = HashMap::new();
    let mut requires: Vec<String> = Vec::new();

    for file in source.files() {
        for (name, members) in &file.script.enums {
            validate_name("enum", name)?;
            if members.is_empty() {
                return Err(ConfigError::Invalid(format!("enum '{}' has no members", name)));
            }
            if let Some(previous) = enum_origins.insert(name.to_lowercase(), name.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "enum '{}' is declared more than once (conflicts with '{}')",
                    name, previous
                )));
            }
            enums.insert(EnumType::new(name.clone(), members.iter().cloned()));
        }

        for tool in &file.script.requires {
            let tool = tool.trim().to_string();
            if !tool.is_empty() && !requires.contains(&tool) {
                requires.push(tool);
            }
        }
    }

    let mut descriptors = Vec::new();
    let mut hidden = HashSet::new();

    for_each_task::<_, ConfigError>(source, |scope, name, task, path| {
        validate_run_items(name, task)?;
        let identity = TaskIdentity::new(scope.clone(), name);
        if task.private {
            hidden.insert(identity.key().to_string());
        }

        descriptors.push(TaskDescriptor {
            identity,
            params: task
                .params
                .iter()
                .map(|p| ParamSpec {
                    name: p.name.clone(),
                    type_name: p.param_type.clone(),
                    default: p.default.as_ref().map(|d| d.0.clone()),
                })
                .collect(),
            idempotency: if task.step {
                Idempotency::OncePerSession
            } else {
                Idempotency::AlwaysRun
            },
            summary: task.summary.clone(),
            calls: task
                .deps
                .iter()
                .map(|c| DeclaredCall::new(c.target()).with_args(call_arguments(c.args())))
                .collect(),
            returns: task.returns.clone(),
            origin: Some(path.to_path_buf()),
        });
        Ok(())
    })?;

    Ok(Analysis {
        name: main.name.clone(),
        usage: main.usage.clone(),
        interpreter: main.interpreter.clone(),
        requires,
        enums,
        descriptors,
        hidden,
    })
}
