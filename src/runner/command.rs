//! Command execution
//!
//! This module handles executing shell commands.

use crate::compiler::CommandStep;
use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{interpolate, RunSettings};
use std::collections::HashMap;
use std::process::{Command as StdCommand, Stdio};

/// Execute a compiled command with the given task variables
pub fn execute_command(
    cmd: &CommandStep,
    settings: &RunSettings,
    vars: &HashMap<String, String>,
) -> ExecutionResult<()> {
    let exec_str = interpolate(&cmd.exec, vars)?;

    if !cmd.quiet {
        let print_str = interpolate(cmd.print(), vars).unwrap_or_else(|_| cmd.print().to_string());
        settings.print_command(&print_str);
    }

    let working_dir = match &cmd.dir {
        Some(dir) => settings.working_dir.join(interpolate(dir, vars)?),
        None => settings.working_dir.clone(),
    };

    let (program, interpreter_args) = settings
        .interpreter
        .split_first()
        .ok_or(ExecutionError::NoInterpreter)?;

    let mut command = StdCommand::new(program);
    command
        .args(interpreter_args)
        .arg(&exec_str)
        .current_dir(&working_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .envs(vars);

    tracing::debug!(command = %exec_str, dir = %working_dir.display(), "Executing command");

    let status = command.status().map_err(|error| ExecutionError::Spawn {
        command: exec_str.clone(),
        error,
    })?;

    if !status.success() {
        return Err(ExecutionError::CommandFailed {
            command: exec_str,
            code: status.code(),
        });
    }

    Ok(())
}
