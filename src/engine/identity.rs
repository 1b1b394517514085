//! Namespace-qualified task identity
//!
//! A task is identified by its namespace path plus its bare name. Lookups are
//! case-insensitive, so every identity also carries a lower-cased key that is
//! used for all map lookups.

use std::fmt;

/// Separator between namespace segments and the task name
pub const SCOPE_SEPARATOR: char = ':';

/// A namespace path such as `docker:images`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope {
    segments: Vec<String>,
}

impl Scope {
    /// The root namespace
    pub fn root() -> Self {
        Scope::default()
    }

    /// Build a scope from its segments, outermost first
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Scope {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// A nested scope one level below this one
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Scope { segments }
    }

    /// The enclosing scope, or `None` at the root
    pub fn parent(&self) -> Option<Scope> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Scope { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Qualify a bare task name with this scope
    pub fn qualify(&self, name: &str) -> String {
        if self.segments.is_empty() {
            name.to_string()
        } else {
            let sep = SCOPE_SEPARATOR.to_string();
            format!("{}{}{}", self.segments.join(&sep), SCOPE_SEPARATOR, name)
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = SCOPE_SEPARATOR.to_string();
        f.write_str(&self.segments.join(&sep))
    }
}

/// Normalize a qualified name into its lookup key
pub fn normalize_key(name: &str) -> String {
    name.trim_start_matches(SCOPE_SEPARATOR).to_lowercase()
}

/// Unique identity of a task within one build
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskIdentity {
    scope: Scope,
    name: String,
    qualified: String,
    key: String,
}

impl TaskIdentity {
    pub fn new(scope: Scope, name: impl Into<String>) -> Self {
        let name = name.into();
        let qualified = scope.qualify(&name);
        let key = normalize_key(&qualified);
        TaskIdentity {
            scope,
            name,
            qualified,
            key,
        }
    }

    /// Bare task name as declared
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Qualified name with the declared casing, e.g. `docker:Build`
    pub fn qualified(&self) -> &str {
        &self.qualified
    }

    /// Lower-cased qualified name used for lookups
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for TaskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified)
    }
}

/// Candidate lookup keys for a call written inside `scope`.
///
/// A name containing the separator is treated as fully qualified. A bare name
/// is tried in the calling scope first, then in each enclosing scope up to the
/// root.
pub fn candidate_keys(scope: &Scope, reference: &str) -> Vec<String> {
    if reference.starts_with(SCOPE_SEPARATOR) || reference.contains(SCOPE_SEPARATOR) {
        return vec![normalize_key(reference)];
    }

    let mut keys = Vec::new();
    let mut current = Some(scope.clone());
    while let Some(s) = current {
        keys.push(normalize_key(&s.qualify(reference)));
        current = s.parent();
    }
    keys
}
