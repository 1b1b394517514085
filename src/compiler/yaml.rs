//! Compiler for stepwise.yml scripts
//!
//! Expands `$(...)` substitutions in every run item:
//! - `$(key)` - a substitution supplied for this build
//! - `$(env:NAME)` - an environment variable, captured into the cache entry
//! - `$(tool:NAME)` - the resolved path of a tool listed in `requires:`
//! - `$(mode)` - `release` or `debug`
//!
//! `$$(...)` is written out as a literal `$(...)`, so shell command
//! substitution survives compilation.
//!
//! Runtime `${var}` references are left for the runner.

use crate::cache::{BuildMode, CapturedVariable, Substitutions};
use crate::compiler::plan::{
    encode_symbols, CommandStep, CompiledScript, CompiledTask, InvokeStep, Step, SymbolEntry,
    SymbolTable,
};
use crate::compiler::{CompileOutput, CompileRequest, ResolvedReference, ScriptCompiler};
use crate::config::{for_each_task, Command, Run, SubTask};
use crate::engine::TaskIdentity;
use crate::error::{CompileError, Result};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

fn substitution_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$(\$?)\(([^)]*)\)").expect("substitution pattern is valid"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCompiler;

impl YamlCompiler {
    pub fn new() -> Self {
        YamlCompiler
    }
}

struct Expander<'a> {
    substitutions: &'a Substitutions,
    mode: BuildMode,
    tools: HashMap<String, PathBuf>,
    captured: BTreeMap<String, String>,
}

impl<'a> Expander<'a> {
    fn new(substitutions: &'a Substitutions, mode: BuildMode, tools: &[ResolvedReference]) -> Self {
        Expander {
            substitutions,
            mode,
            tools: tools
                .iter()
                .map(|t| (t.name.clone(), t.path.clone()))
                .collect(),
            captured: BTreeMap::new(),
        }
    }

    fn expand(&mut self, text: &str) -> std::result::Result<String, CompileError> {
        let mut expanded = String::with_capacity(text.len());
        let mut last = 0;

        for caps in substitution_pattern().captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            expanded.push_str(&text[last..whole.start()]);
            if caps[1].is_empty() {
                expanded.push_str(&self.lookup(caps[2].trim())?);
            } else {
                expanded.push_str(&whole.as_str()[1..]);
            }
            last = whole.end();
        }
        expanded.push_str(&text[last..]);

        Ok(expanded)
    }

    fn lookup(&mut self, token: &str) -> std::result::Result<String, CompileError> {
        if let Some(name) = token.strip_prefix("env:") {
            let name = name.trim();
            let value = env::var(name).unwrap_or_default();
            self.captured.insert(name.to_string(), value.clone());
            return Ok(value);
        }

        if let Some(name) = token.strip_prefix("tool:") {
            let name = name.trim();
            return self
                .tools
                .get(name)
                .map(|path| path.display().to_string())
                .ok_or_else(|| CompileError::UndeclaredTool(name.to_string()));
        }

        if token.eq_ignore_ascii_case("mode") {
            return Ok(self.mode.to_string());
        }

        self.substitutions
            .get(token)
            .map(str::to_string)
            .ok_or_else(|| CompileError::UndefinedSubstitution(token.to_string()))
    }

    fn expand_run(&mut self, run: &Run, steps: &mut Vec<Step>) -> std::result::Result<(), CompileError> {
        match run {
            Run::SimpleCommand(exec) => {
                steps.push(Step::Command(CommandStep::new(self.expand(exec)?)));
            }
            Run::Complex(item) => {
                for command in &item.command {
                    steps.push(Step::Command(self.expand_command(command)?));
                }
                for subtask in &item.task {
                    let mut invoke = self.expand_subtask(subtask)?;
                    for arg in &item.args {
                        invoke.args.push(self.expand(&arg.0)?);
                    }
                    steps.push(Step::Invoke(invoke));
                }
            }
        }
        Ok(())
    }

    fn expand_command(&mut self, command: &Command) -> std::result::Result<CommandStep, CompileError> {
        match command {
            Command::Simple(exec) => Ok(CommandStep::new(self.expand(exec)?)),
            Command::Complex(detail) => Ok(CommandStep {
                exec: self.expand(&detail.exec)?,
                print: detail.print.as_deref().map(|p| self.expand(p)).transpose()?,
                quiet: detail.quiet,
                dir: detail.dir.as_deref().map(|d| self.expand(d)).transpose()?,
            }),
        }
    }

    fn expand_subtask(&mut self, subtask: &SubTask) -> std::result::Result<InvokeStep, CompileError> {
        Ok(InvokeStep {
            task: self.expand(subtask.name())?,
            args: subtask
                .args()
                .iter()
                .map(|a| self.expand(&a.0))
                .collect::<std::result::Result<_, _>>()?,
        })
    }
}

impl ScriptCompiler for YamlCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput> {
        let resolved = request.resolver.resolve(&request.analysis.requires)?;
        let mut expander = Expander::new(request.substitutions, request.mode, &resolved);

        let interpreter = request
            .analysis
            .interpreter
            .as_ref()
            .map(|parts| {
                parts
                    .iter()
                    .map(|p| expander.expand(p))
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .transpose()?;

        let mut tasks = Vec::new();
        let mut symbols = SymbolTable::new();

        for_each_task(request.source, |scope, name, task, path| {
            let identity = TaskIdentity::new(scope.clone(), name);

            let mut steps = Vec::new();
            for run in &task.run {
                expander.expand_run(run, &mut steps)?;
            }

            if request.mode.is_debug() {
                symbols.insert(
                    identity.key().to_string(),
                    SymbolEntry {
                        qualified: identity.qualified().to_string(),
                        file: path.display().to_string(),
                        summary: task.summary.clone(),
                    },
                );
            }

            tasks.push(CompiledTask {
                key: identity.key().to_string(),
                steps,
            });
            Ok::<(), crate::error::StepwiseError>(())
        })?;

        let plan = CompiledScript {
            name: request.analysis.name.clone(),
            interpreter,
            tasks,
        };

        let symbols = if request.mode.is_debug() {
            Some(encode_symbols(&symbols)?)
        } else {
            None
        };

        tracing::debug!(
            tasks = plan.tasks.len(),
            captured = expander.captured.len(),
            mode = %request.mode,
            "Compiled script"
        );

        Ok(CompileOutput {
            artifact: plan.encode()?,
            symbols,
            references: resolved
                .iter()
                .map(|r| r.path.display().to_string())
                .collect(),
            captured: expander
                .captured
                .into_iter()
                .map(|(name, value)| CapturedVariable::new(name, value))
                .collect(),
        })
    }
}
