//! Common test utilities

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use stepwise::cache::BuildMode;
use stepwise::compiler::{
    CompileOutput, CompileRequest, ReferenceResolver, ResolvedReference, ScriptCompiler,
    YamlCompiler,
};
use stepwise::config::ScriptSource;
use stepwise::error::CompileError;
use stepwise::pipeline::{self, Build, BuildOptions};
use stepwise::runner::{RunSettings, Verbosity};
use tempfile::TempDir;

/// Create a temporary directory with a stepwise.yml file
pub fn create_test_script(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let script_path = temp_dir.path().join("stepwise.yml");
    fs::write(&script_path, content).unwrap();
    (temp_dir, script_path)
}

/// Create a test script with an empty subdirectory next to it
pub fn create_test_script_in_subdir(content: &str) -> (TempDir, PathBuf, PathBuf) {
    let (temp_dir, script_path) = create_test_script(content);
    let sub_dir = temp_dir.path().join("subdir");
    fs::create_dir(&sub_dir).unwrap();
    (temp_dir, script_path, sub_dir)
}

/// Build options with output silenced
pub fn options(cache_root: Option<&Path>, mode: BuildMode) -> BuildOptions {
    BuildOptions {
        mode,
        cache_root: cache_root.map(Path::to_path_buf),
        settings: RunSettings::new().with_verbosity(Verbosity::Silent),
        ..BuildOptions::default()
    }
}

/// Load and build a script without caching
pub fn build_script(script_path: &Path) -> Build {
    let source = ScriptSource::load(script_path).unwrap();
    pipeline::build(
        &source,
        &options(None, BuildMode::Release),
        &YamlCompiler::new(),
        &StaticResolver,
    )
    .unwrap()
}

/// Lines of a file, or none if it does not exist
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Compiler wrapper that counts how often it was asked to compile
#[derive(Default)]
pub struct CountingCompiler {
    inner: YamlCompiler,
    calls: AtomicUsize,
}

impl CountingCompiler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ScriptCompiler for CountingCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> stepwise::Result<CompileOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(request)
    }
}

/// Resolves every tool to `/usr/bin/<name>` without touching the system
pub struct StaticResolver;

impl ReferenceResolver for StaticResolver {
    fn resolve(&self, references: &[String]) -> Result<Vec<ResolvedReference>, CompileError> {
        Ok(references
            .iter()
            .map(|name| ResolvedReference {
                name: name.clone(),
                path: PathBuf::from("/usr/bin").join(name),
            })
            .collect())
    }
}

/// Resolver that counts how often it was consulted
#[derive(Default)]
pub struct CountingResolver {
    calls: AtomicUsize,
}

impl CountingResolver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReferenceResolver for CountingResolver {
    fn resolve(&self, references: &[String]) -> Result<Vec<ResolvedReference>, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StaticResolver.resolve(references)
    }
}
