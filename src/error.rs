//! Error types for Stepwise

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Stepwise operations
pub type Result<T> = std::result::Result<T, StepwiseError>;

/// Main error type for Stepwise
#[derive(Error, Debug)]
pub enum StepwiseError {
    /// Script discovery and parsing errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Build-time graph and signature errors
    #[error("{0}")]
    Structural(#[from] StructuralError),

    /// Errors binding caller arguments to a task
    #[error("{0}")]
    Argument(#[from] ArgumentError),

    /// No task with the requested name
    #[error("Task '{0}' is not defined")]
    TaskNotFound(String),

    /// A task body failed
    #[error("{0}")]
    Invocation(#[from] InvocationError),

    /// A step already failed with the same arguments in this session
    #[error("Task '{task}' already failed in this session: {reason}")]
    StepFailed { task: String, reason: String },

    /// Compile-time expansion errors
    #[error("Compilation error: {0}")]
    Compile(#[from] CompileError),

    /// Cache faults (callers fall back to recomputing)
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Script discovery and parsing errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find script file (searched: {0})")]
    NotFound(String),

    #[error("Failed to read '{path}': {error}")]
    Read { path: PathBuf, error: String },

    #[error("Invalid YAML in '{path}': {error}")]
    Yaml { path: PathBuf, error: String },

    #[error("Failed to load sibling script '{path}': {error}")]
    LoadFile { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Structural errors are detected while the task graph is built and are
/// always fatal: nothing executes once one is raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("Task '{name}' conflicts with '{existing}': task names are case-insensitive and may not differ only by case")]
    DuplicateTaskCase { name: String, existing: String },

    #[error("Task '{name}' is declared more than once with different parameters; overloading is not supported, use parameter defaults instead")]
    DuplicateTaskOverload { name: String },

    #[error("Task '{name}' is declared more than once")]
    DuplicateTask { name: String },

    #[error("Circular dependency detected: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("Task '{task}' calls itself; recursion is not allowed")]
    RecursiveCall { task: String },

    #[error("Invalid signature for task '{task}': {reason}")]
    SignatureViolation { task: String, reason: String },

    #[error("Task '{task}' depends on '{dependency}', which is not defined")]
    UnknownTask { task: String, dependency: String },

    #[error("Task '{task}' has no executable body")]
    UnboundTask { task: String },
}

/// Argument errors are fatal for the single requested invocation only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("Task '{task}': positional argument at position {position} follows a named argument; positional arguments must come first")]
    Order { task: String, position: usize },

    #[error("Task '{task}': {reason}")]
    Binding { task: String, reason: String },

    #[error("Task '{task}': cannot convert argument '{parameter}' at position {position}: {reason}")]
    Conversion {
        task: String,
        parameter: String,
        position: usize,
        reason: String,
    },
}

/// A task body failed. The original failure is kept as the source.
#[derive(Error, Debug)]
#[error("Task '{task}' failed: {source:#}")]
pub struct InvocationError {
    pub task: String,
    #[source]
    pub source: anyhow::Error,
}

/// Compile-time expansion errors
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Substitution '$({0})' is not defined")]
    UndefinedSubstitution(String),

    #[error("Tool '{0}' is not listed in requires")]
    UndeclaredTool(String),

    #[error("Required tool '{name}' was not found: {error}")]
    ToolNotFound { name: String, error: String },

    #[error("Failed to encode compiled plan: {0}")]
    Encode(String),
}

/// Cache faults. These never fail a build; callers log them and recompute.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to access '{path}': {error}")]
    Io { path: PathBuf, error: io::Error },

    #[error("Corrupt cache entry '{path}': {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Shell command failures inside a task body
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command `{command}` failed with exit code {code:?}")]
    CommandFailed { command: String, code: Option<i32> },

    #[error("Failed to start `{command}`: {error}")]
    Spawn { command: String, error: io::Error },

    #[error("No interpreter configured")]
    NoInterpreter,

    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),
}

/// Runtime `${var}` interpolation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Recursive interpolation detected")]
    RecursiveInterpolation,
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for graph construction
pub type StructuralResult<T> = std::result::Result<T, StructuralError>;

/// Specialized result type for argument binding
pub type ArgumentResult<T> = std::result::Result<T, ArgumentError>;

/// Specialized result type for command execution
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;

/// Specialized result type for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, error: io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            error,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CacheError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Recover a Stepwise error that travelled through a task body as
/// `anyhow::Error`, so nested failures are not wrapped twice.
pub(crate) fn into_invocation_error(task: &str, error: anyhow::Error) -> StepwiseError {
    match error.downcast::<StepwiseError>() {
        Ok(inner) => inner,
        Err(error) => StepwiseError::Invocation(InvocationError {
            task: task.to_string(),
            source: error,
        }),
    }
}
