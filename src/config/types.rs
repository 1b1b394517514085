//! Script file types
//!
//! This module defines the data structures that represent a stepwise.yml file.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Top-level script structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScriptFile {
    /// Application name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Application usage description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    /// Interpreter to use for commands (e.g., ["sh", "-c"])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Vec<String>>,

    /// Sibling scripts to load, relative to this file
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub load: Vec<String>,

    /// External tools this script needs on PATH
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,

    /// Enum types usable as parameter types
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub enums: IndexMap<String, Vec<String>>,

    /// Tasks in the root namespace
    #[serde(default)]
    pub tasks: IndexMap<String, Task>,

    /// Nested namespaces
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub namespaces: IndexMap<String, Namespace>,
}

/// A namespace with its own tasks and nested namespaces
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Namespace {
    #[serde(default)]
    pub tasks: IndexMap<String, Task>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub namespaces: IndexMap<String, Namespace>,
}

/// A task definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Task {
    /// One-line documentation summary
    #[serde(default, alias = "usage", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Run at most once per distinct argument set within a session
    #[serde(default)]
    pub step: bool,

    /// Whether this task is hidden from listings
    #[serde(default)]
    pub private: bool,

    /// Formal parameters, in positional order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,

    /// Tasks this task calls before its own body
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_calls"
    )]
    pub deps: Vec<Call>,

    /// Run items to execute
    #[serde(default, deserialize_with = "deserialize_run_items")]
    pub run: Vec<Run>,

    /// Declared return type; rejected by signature validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
}

/// A formal parameter
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Param {
    pub name: String,

    /// bool, int, string, or a declared enum name
    #[serde(rename = "type", default = "default_param_type")]
    pub param_type: String,

    /// Default value, making the parameter optional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Scalar>,
}

fn default_param_type() -> String {
    "string".to_string()
}

/// A scalar written as a string, number or boolean, kept as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Scalar(pub String);

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        use serde_yaml::Value;

        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(Scalar(s)),
            Value::Number(n) => Ok(Scalar(n.to_string())),
            Value::Bool(b) => Ok(Scalar(b.to_string())),
            _ => Err(D::Error::custom("expected a string, number or boolean")),
        }
    }
}

/// A declared call to another task
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Call {
    /// Task name only
    Simple(String),

    /// Task name with arguments
    Complex(CallDetail),
}

/// Detailed call specification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallDetail {
    /// Name of the task to call
    pub task: String,

    /// Arguments, `name=value` for named ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Scalar>,
}

impl Call {
    pub fn target(&self) -> &str {
        match self {
            Call::Simple(name) => name,
            Call::Complex(detail) => &detail.task,
        }
    }

    pub fn args(&self) -> &[Scalar] {
        match self {
            Call::Simple(_) => &[],
            Call::Complex(detail) => &detail.args,
        }
    }
}

/// A run item - a command or a runtime task invocation
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Run {
    /// Simple string command
    SimpleCommand(String),

    /// Complex run item
    Complex(RunItem),
}

/// A complex run item
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunItem {
    /// Commands to execute
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_commands"
    )]
    pub command: Vec<Command>,

    /// Tasks to invoke at runtime through the registry
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_subtasks"
    )]
    pub task: Vec<SubTask>,

    /// Arguments for the single `task:` of this item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Scalar>,
}

/// A command to execute
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Simple string command
    Simple(String),

    /// Complex command with additional options
    Complex(CommandDetail),
}

/// Detailed command specification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandDetail {
    /// The command to execute
    pub exec: String,

    /// What to print when running (defaults to exec)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print: Option<String>,

    /// Whether to suppress the echo line
    #[serde(default)]
    pub quiet: bool,

    /// Working directory for the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

/// A reference to a task invoked at runtime
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SubTask {
    /// Simple task name
    Simple(String),

    /// Task name with arguments
    Complex(SubTaskDetail),
}

impl SubTask {
    pub fn name(&self) -> &str {
        match self {
            SubTask::Simple(name) => name,
            SubTask::Complex(detail) => &detail.name,
        }
    }

    pub fn args(&self) -> &[Scalar] {
        match self {
            SubTask::Simple(_) => &[],
            SubTask::Complex(detail) => &detail.args,
        }
    }
}

/// Detailed subtask specification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubTaskDetail {
    /// Name of the task to run; may use ${var} interpolation
    pub name: String,

    /// Arguments to pass to the subtask
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Scalar>,
}

/// Deserialize a value that may be a single item or a sequence of items
fn one_or_many<'de, D, T>(deserializer: D, what: &str) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| serde_yaml::from_value(item).map_err(D::Error::custom))
            .collect(),
        Value::String(_) | Value::Mapping(_) => {
            Ok(vec![serde_yaml::from_value(value).map_err(D::Error::custom)?])
        }
        _ => Err(D::Error::custom(format!(
            "{} must be a string, object, or array",
            what
        ))),
    }
}

fn deserialize_run_items<'de, D>(deserializer: D) -> Result<Vec<Run>, D::Error>
where
    D: Deserializer<'de>,
{
    one_or_many(deserializer, "run")
}

fn deserialize_calls<'de, D>(deserializer: D) -> Result<Vec<Call>, D::Error>
where
    D: Deserializer<'de>,
{
    one_or_many(deserializer, "deps")
}

fn deserialize_commands<'de, D>(deserializer: D) -> Result<Vec<Command>, D::Error>
where
    D: Deserializer<'de>,
{
    one_or_many(deserializer, "command")
}

fn deserialize_subtasks<'de, D>(deserializer: D) -> Result<Vec<SubTask>, D::Error>
where
    D: Deserializer<'de>,
{
    one_or_many(deserializer, "task")
}
