//! Task nodes and the values that flow into them

use crate::engine::identity::TaskIdentity;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Index of a node inside a [`TaskGraph`](crate::engine::TaskGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Whether a task body runs every time it is reached or once per argument set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Idempotency {
    #[default]
    AlwaysRun,
    OncePerSession,
}

/// A caller-supplied argument. An empty name means positional.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskArgument {
    pub name: Option<String>,
    pub value: String,
}

impl TaskArgument {
    pub fn positional(value: impl Into<String>) -> Self {
        TaskArgument {
            name: None,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<String>) -> Self {
        TaskArgument {
            name: Some(name.into()),
            value: value.into(),
        }
    }

    /// Parse a command-line style token: `name=value` is named, anything else
    /// is positional.
    pub fn parse(token: &str) -> Self {
        if let Some((name, value)) = token.split_once('=') {
            let is_ident = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
            if is_ident {
                return TaskArgument::named(name, value);
            }
        }
        TaskArgument::positional(token)
    }

    pub fn is_positional(&self) -> bool {
        self.name.is_none()
    }
}

/// A declared enumeration usable as a parameter type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<String>,
}

impl EnumType {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EnumType {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Match a member by name, accepting `Member` or `Type.Member`, ignoring case
    pub fn member(&self, raw: &str) -> Option<&str> {
        let raw = raw.trim();
        let bare = match raw.rsplit_once('.') {
            Some((ty, member)) if ty.eq_ignore_ascii_case(&self.name) => member,
            _ => raw,
        };
        self.members
            .iter()
            .find(|m| m.eq_ignore_ascii_case(bare))
            .map(String::as_str)
    }
}

/// Parameter kinds that command-line values can be converted into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Str,
    Enum(Arc<EnumType>),
}

impl ParamKind {
    /// Convert a raw string into a typed value
    pub fn convert(&self, raw: &str) -> Result<Value, String> {
        match self {
            ParamKind::Bool => raw
                .trim()
                .to_lowercase()
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|e| format!("'{}' is not a boolean ({})", raw, e)),
            ParamKind::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| format!("'{}' is not an integer ({})", raw, e)),
            ParamKind::Str => Ok(Value::Str(raw.to_string())),
            ParamKind::Enum(ty) => ty
                .member(raw)
                .map(|member| Value::Enum {
                    ty: ty.name.clone(),
                    member: member.to_string(),
                })
                .ok_or_else(|| {
                    format!(
                        "'{}' is not a member of {} (expected one of: {})",
                        raw,
                        ty.name,
                        ty.members.join(", ")
                    )
                }),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Bool => f.write_str("bool"),
            ParamKind::Int => f.write_str("int"),
            ParamKind::Str => f.write_str("string"),
            ParamKind::Enum(ty) => f.write_str(&ty.name),
        }
    }
}

/// A bound, converted parameter value.
///
/// Equality is by value, so `"mon"` and `"Days.Mon"` bind to the same
/// `Value::Enum` and share a memoization record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    Enum { ty: String, member: String },
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => f.write_str(s),
            Value::Enum { member, .. } => f.write_str(member),
        }
    }
}

/// A validated formal parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
}

/// A call from one task to another, with the arguments written at the call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub target: NodeId,
    pub args: Vec<TaskArgument>,
}

/// One declared unit of work
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub identity: TaskIdentity,
    pub params: Vec<Parameter>,
    pub summary: Option<String>,
    pub idempotency: Idempotency,
    pub dependencies: Vec<Dependency>,
    pub origin: Option<PathBuf>,
}

impl TaskNode {
    pub fn name(&self) -> &str {
        self.identity.qualified()
    }

    pub fn is_step(&self) -> bool {
        self.idempotency == Idempotency::OncePerSession
    }

    /// Human readable signature, e.g. `build(config: Config = Debug, fast: bool)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| match &p.default {
                Some(default) => format!("{}: {} = {}", p.name, p.kind, default),
                None => format!("{}: {}", p.name, p.kind),
            })
            .collect();
        format!("{}({})", self.identity.qualified(), params.join(", "))
    }
}
