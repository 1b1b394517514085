//! Script compilation
//!
//! Compilation resolves a script's external tool references, applies every
//! compile-time substitution and produces the artifact the cache stores.

pub mod plan;
pub mod resolver;
pub mod yaml;

pub use plan::*;
pub use resolver::*;
pub use yaml::*;

use crate::cache::{BuildMode, CapturedVariable, Substitutions};
use crate::config::{Analysis, ScriptSource};
use crate::error::Result;

/// Everything a compiler is given
pub struct CompileRequest<'a> {
    pub source: &'a ScriptSource,
    pub analysis: &'a Analysis,
    pub substitutions: &'a Substitutions,
    pub mode: BuildMode,
    pub resolver: &'a dyn ReferenceResolver,
}

/// The outputs of one compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub artifact: Vec<u8>,

    /// Present in debug builds only
    pub symbols: Option<Vec<u8>>,

    /// Resolved paths of the external references
    pub references: Vec<String>,

    /// Environment values inlined into the artifact
    pub captured: Vec<CapturedVariable>,
}

pub trait ScriptCompiler: Send + Sync {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput>;
}
