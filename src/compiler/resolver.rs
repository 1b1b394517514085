//! External reference resolution
//!
//! A script's `requires:` list names tools that must be found before the
//! script can be compiled. Resolving them is the expensive "restore" step
//! that the first cache tier avoids repeating.

use crate::error::CompileError;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;

/// A required tool and where it was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub name: String,
    pub path: PathBuf,
}

pub trait ReferenceResolver: Send + Sync {
    fn resolve(&self, references: &[String]) -> Result<Vec<ResolvedReference>, CompileError>;
}

/// Resolves tools on `PATH`, or on an explicit search path
#[derive(Debug, Clone, Default)]
pub struct ToolResolver {
    search_path: Option<OsString>,
}

impl ToolResolver {
    pub fn new() -> Self {
        ToolResolver::default()
    }

    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        ToolResolver {
            search_path: Some(search_path.into()),
        }
    }

    fn locate(&self, name: &str) -> which::Result<PathBuf> {
        match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                which::which_in(name, Some(paths), cwd)
            }
            None => which::which(name),
        }
    }
}

impl ReferenceResolver for ToolResolver {
    fn resolve(&self, references: &[String]) -> Result<Vec<ResolvedReference>, CompileError> {
        references
            .iter()
            .map(|name| {
                let path = self.locate(name).map_err(|e| CompileError::ToolNotFound {
                    name: name.clone(),
                    error: e.to_string(),
                })?;
                tracing::debug!(tool = %name, path = %path.display(), "Resolved tool");
                Ok(ResolvedReference {
                    name: name.clone(),
                    path,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn executable(dir: &std::path::Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_resolves_tool_on_search_path() {
        let temp_dir = TempDir::new().unwrap();
        let expected = executable(temp_dir.path(), "fake-tool");

        let resolver = ToolResolver::with_search_path(temp_dir.path());
        let resolved = resolver.resolve(&["fake-tool".to_string()]).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "fake-tool");
        assert_eq!(
            resolved[0].path.canonicalize().unwrap(),
            expected.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = ToolResolver::with_search_path(temp_dir.path());
        let result = resolver.resolve(&["definitely-not-installed".to_string()]);
        assert!(matches!(result, Err(CompileError::ToolNotFound { .. })));
    }

    #[test]
    fn test_nothing_to_resolve() {
        assert!(ToolResolver::new().resolve(&[]).unwrap().is_empty());
    }
}
