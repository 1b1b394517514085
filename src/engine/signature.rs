//! Task descriptors and signature validation
//!
//! Descriptors are what the script analyzer reports for each declared task.
//! Their parameter lists are still raw text here; [`validate_signature`] turns
//! them into typed [`Parameter`]s or rejects the declaration.

use crate::engine::identity::TaskIdentity;
use crate::engine::node::{EnumType, Idempotency, ParamKind, Parameter, TaskArgument};
use crate::error::{StructuralError, StructuralResult};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// A parameter as written in the script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub type_name: String,
    pub default: Option<String>,
}

/// A call to another task as written in the script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredCall {
    pub target: String,
    pub args: Vec<TaskArgument>,
}

impl DeclaredCall {
    pub fn new(target: impl Into<String>) -> Self {
        DeclaredCall {
            target: target.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<TaskArgument>) -> Self {
        self.args = args;
        self
    }
}

/// Everything the analyzer knows about one declared task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub identity: TaskIdentity,
    pub params: Vec<ParamSpec>,
    pub idempotency: Idempotency,
    pub summary: Option<String>,
    pub calls: Vec<DeclaredCall>,
    /// A declared return type; tasks must not return values
    pub returns: Option<String>,
    pub origin: Option<PathBuf>,
}

impl TaskDescriptor {
    pub fn new(identity: TaskIdentity) -> Self {
        TaskDescriptor {
            identity,
            params: Vec::new(),
            idempotency: Idempotency::AlwaysRun,
            summary: None,
            calls: Vec::new(),
            returns: None,
            origin: None,
        }
    }

    pub fn step(mut self) -> Self {
        self.idempotency = Idempotency::OncePerSession;
        self
    }

    pub fn param(mut self, name: &str, type_name: &str, default: Option<&str>) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            type_name: type_name.to_string(),
            default: default.map(str::to_string),
        });
        self
    }

    pub fn calls(mut self, call: DeclaredCall) -> Self {
        self.calls.push(call);
        self
    }

    /// The raw parameter signature, used to tell overloads from plain duplicates
    pub fn raw_signature(&self) -> Vec<String> {
        self.params
            .iter()
            .map(|p| p.type_name.trim().to_lowercase())
            .collect()
    }
}

/// Enum types declared by a script, looked up case-insensitively
#[derive(Debug, Clone, Default)]
pub struct EnumCatalog {
    types: HashMap<String, Arc<EnumType>>,
}

impl EnumCatalog {
    pub fn new() -> Self {
        EnumCatalog::default()
    }

    pub fn insert(&mut self, ty: EnumType) {
        self.types.insert(ty.name.to_lowercase(), Arc::new(ty));
    }

    pub fn get(&self, name: &str) -> Option<Arc<EnumType>> {
        self.types.get(&name.to_lowercase()).cloned()
    }
}

/// Resolve a type name into a parameter kind
fn resolve_kind(type_name: &str, enums: &EnumCatalog) -> Result<ParamKind, String> {
    let trimmed = type_name.trim();
    let lower = trimmed.to_lowercase();

    if lower.starts_with("ref ") || lower.starts_with("out ") || lower.starts_with('&') {
        return Err(format!(
            "parameter type '{}' is passed by reference; ref/out parameters are not supported",
            trimmed
        ));
    }

    match lower.as_str() {
        "bool" | "boolean" => Ok(ParamKind::Bool),
        "int" | "integer" => Ok(ParamKind::Int),
        "string" | "str" => Ok(ParamKind::Str),
        _ => enums.get(trimmed).map(ParamKind::Enum).ok_or_else(|| {
            format!(
                "unsupported parameter type '{}'; use bool, int, string or a declared enum",
                trimmed
            )
        }),
    }
}

/// Validate a descriptor's signature and produce its typed parameters
pub fn validate_signature(
    descriptor: &TaskDescriptor,
    enums: &EnumCatalog,
) -> StructuralResult<Vec<Parameter>> {
    let task = descriptor.identity.qualified().to_string();
    let violation = |reason: String| StructuralError::SignatureViolation {
        task: task.clone(),
        reason,
    };

    let name = descriptor.identity.name();
    if name.contains('<') || name.contains('>') {
        return Err(violation("generic tasks are not supported".to_string()));
    }

    if let Some(returns) = &descriptor.returns {
        if !returns.trim().is_empty() {
            return Err(violation(format!(
                "tasks must not return a value (declared return type '{}')",
                returns.trim()
            )));
        }
    }

    let mut seen = HashSet::new();
    let mut params = Vec::with_capacity(descriptor.params.len());

    for spec in &descriptor.params {
        if !seen.insert(spec.name.to_lowercase()) {
            return Err(violation(format!(
                "parameter '{}' is declared more than once (parameter names are case-insensitive)",
                spec.name
            )));
        }

        let kind = resolve_kind(&spec.type_name, enums).map_err(&violation)?;

        let default = match &spec.default {
            Some(raw) => Some(kind.convert(raw).map_err(|e| {
                violation(format!("default for parameter '{}' is invalid: {}", spec.name, e))
            })?),
            None => None,
        };

        params.push(Parameter {
            name: spec.name.clone(),
            kind,
            default,
        });
    }

    Ok(params)
}
