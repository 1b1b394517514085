//! Compiled plan format
//!
//! The artifact a compilation produces is a JSON-encoded [`CompiledScript`]:
//! every task's run items with all compile-time substitutions already applied.

use crate::error::CompileError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledScript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Vec<String>>,

    pub tasks: Vec<CompiledTask>,
}

/// Steps of one task, keyed by its normalized identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledTask {
    pub key: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Run a shell command through the interpreter
    Command(CommandStep),

    /// Invoke another task through the registry
    Invoke(InvokeStep),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStep {
    pub exec: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print: Option<String>,

    #[serde(default)]
    pub quiet: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl CommandStep {
    pub fn new(exec: impl Into<String>) -> Self {
        CommandStep {
            exec: exec.into(),
            print: None,
            quiet: false,
            dir: None,
        }
    }

    /// What to echo before running
    pub fn print(&self) -> &str {
        self.print.as_deref().unwrap_or(&self.exec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeStep {
    /// Task name; may use `${var}` interpolation
    pub task: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl CompiledScript {
    pub fn encode(&self) -> Result<Vec<u8>, CompileError> {
        serde_json::to_vec(self).map_err(|e| CompileError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn task(&self, key: &str) -> Option<&CompiledTask> {
        self.tasks.iter().find(|t| t.key == key)
    }
}

/// Debug symbols: where each task was declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub qualified: String,
    pub file: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

pub type SymbolTable = BTreeMap<String, SymbolEntry>;

pub fn encode_symbols(symbols: &SymbolTable) -> Result<Vec<u8>, CompileError> {
    serde_json::to_vec_pretty(symbols).map_err(|e| CompileError::Encode(e.to_string()))
}
