//! Settings shared by every shell task body of one build

use colored::Colorize;
use std::env;
use std::path::PathBuf;

/// Settings applied to every command a build runs
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Directory commands run in
    pub working_dir: PathBuf,

    /// Interpreter prefix (e.g., ["bash", "-c"])
    pub interpreter: Vec<String>,

    /// Verbosity level
    pub verbosity: Verbosity,
}

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    #[default]
    Normal = 2,
    Verbose = 3,
}

pub fn default_interpreter() -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string()]
}

impl RunSettings {
    pub fn new() -> Self {
        RunSettings {
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            interpreter: default_interpreter(),
            verbosity: Verbosity::Normal,
        }
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    /// Set the interpreter; an empty list keeps the default
    pub fn with_interpreter(mut self, interpreter: Vec<String>) -> Self {
        if !interpreter.is_empty() {
            self.interpreter = interpreter;
        }
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Print the echo line of a command
    pub fn print_command(&self, line: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{} {}", "[RUN]".cyan().bold(), line);
        }
    }

    /// Print task start message
    pub fn print_task_start(&self, task_name: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{} {}", "[TASK]".green().bold(), task_name);
        }
    }

    /// Print task complete message (only in verbose mode)
    pub fn print_task_complete(&self, task_name: &str) {
        if self.verbosity >= Verbosity::Verbose {
            eprintln!("{} {}", "[DONE]".dimmed(), task_name);
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::new()
    }
}
