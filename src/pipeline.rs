//! Build pipeline
//!
//! Turns a loaded script into a ready [`Registry`]: analysis, graph
//! validation, cache lookup, compilation on a miss, and binding one shell
//! body to every task.

use crate::cache::{ArtifactCache, BuildMode, CacheEntry, CacheKey, RestoreCache, Substitutions};
use crate::compiler::{CompileRequest, CompiledScript, ReferenceResolver, ScriptCompiler};
use crate::config::{analyze, Analysis, ScriptSource};
use crate::engine::{build_graph, Registry, TaskGraph};
use crate::error::{CompileError, Result, StructuralError};
use crate::runner::{RunSettings, ShellTask};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Inputs of one build
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub substitutions: Substitutions,
    pub mode: BuildMode,

    /// Cache root; `None` disables both cache tiers
    pub cache_root: Option<PathBuf>,

    /// Base settings for shell bodies; the working directory and interpreter
    /// come from the script
    pub settings: RunSettings,
}

/// Result of a build
#[derive(Debug)]
pub struct Build {
    pub registry: Registry,
    pub analysis: Analysis,
    pub cache_key: CacheKey,
    pub entry: CacheEntry,

    /// Whether the plan came from the artifact cache
    pub from_cache: bool,
}

/// Build a registry for `source`
pub fn build(
    source: &ScriptSource,
    options: &BuildOptions,
    compiler: &dyn ScriptCompiler,
    resolver: &dyn ReferenceResolver,
) -> Result<Build> {
    let analysis = analyze(source)?;
    let graph = build_graph(&analysis.descriptors, analysis.enums.clone())?;

    let key = CacheKey::compute(&source.combined_text(), &options.substitutions, options.mode);
    let cache = options.cache_root.as_ref().map(ArtifactCache::new);

    let cached = cache
        .as_ref()
        .and_then(|cache| cached_plan(cache, source, &key, options.mode, &graph));

    let (plan, entry, from_cache) = match cached {
        Some((plan, entry)) => (plan, entry, true),
        None => {
            let restore;
            let resolver: &dyn ReferenceResolver = match &cache {
                Some(cache) => {
                    restore = RestoreCache::new(&cache.script_dir(source.identity()), resolver);
                    &restore
                }
                None => resolver,
            };

            let output = compiler.compile(&CompileRequest {
                source,
                analysis: &analysis,
                substitutions: &options.substitutions,
                mode: options.mode,
                resolver,
            })?;
            let entry = CacheEntry::from_output(&output);
            let plan = decode_plan(&entry.artifact, &graph).map_err(CompileError::Encode)?;

            if let Some(cache) = &cache {
                if let Err(e) = cache.store(source.identity(), &key, &entry) {
                    warn!(cache_key = %key, operation = "store", "Cache fault: {}", e);
                }
            }
            (plan, entry, false)
        }
    };

    info!(
        cache_key = %key,
        status = if from_cache { "hit" } else { "miss" },
        tasks = graph.len(),
        "Build ready"
    );

    let registry = bind(graph, &plan, source, &options.settings)?;

    Ok(Build {
        registry,
        analysis,
        cache_key: key,
        entry,
        from_cache,
    })
}

fn cached_plan(
    cache: &ArtifactCache,
    source: &ScriptSource,
    key: &CacheKey,
    mode: BuildMode,
    graph: &TaskGraph,
) -> Option<(CompiledScript, CacheEntry)> {
    match cache.lookup(source.identity(), key, mode) {
        Ok(Some(entry)) => match decode_plan(&entry.artifact, graph) {
            Ok(plan) => Some((plan, entry)),
            Err(reason) => {
                warn!(cache_key = %key, operation = "decode", "Cache fault: {}", reason);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(cache_key = %key, operation = "lookup", "Cache fault: {}", e);
            None
        }
    }
}

/// Decode a plan and check it covers every task of the graph
fn decode_plan(bytes: &[u8], graph: &TaskGraph) -> std::result::Result<CompiledScript, String> {
    let plan = CompiledScript::decode(bytes).map_err(|e| format!("undecodable plan: {}", e))?;
    for (_, node) in graph.nodes() {
        if plan.task(node.identity.key()).is_none() {
            return Err(format!("plan has no entry for task '{}'", node.name()));
        }
    }
    Ok(plan)
}

fn bind(
    graph: TaskGraph,
    plan: &CompiledScript,
    source: &ScriptSource,
    settings: &RunSettings,
) -> Result<Registry> {
    let settings = Arc::new(
        settings
            .clone()
            .with_working_dir(source.dir().to_path_buf())
            .with_interpreter(plan.interpreter.clone().unwrap_or_default()),
    );

    let mut builder = Registry::builder(graph);
    let nodes: Vec<_> = builder
        .graph()
        .nodes()
        .map(|(id, node)| (id, node.identity.key().to_string(), node.name().to_string()))
        .collect();

    for (id, key, name) in nodes {
        let task = plan
            .task(&key)
            .ok_or(StructuralError::UnboundTask { task: name })?;
        builder.bind_node(id, Arc::new(ShellTask::from_compiled(task, settings.clone())));
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{ToolResolver, YamlCompiler};
    use crate::engine::TaskArgument;
    use crate::error::StepwiseError;
    use crate::runner::Verbosity;
    use std::path::Path;
    use tempfile::TempDir;

    fn options(cache: Option<&Path>) -> BuildOptions {
        BuildOptions {
            cache_root: cache.map(Path::to_path_buf),
            settings: RunSettings::new().with_verbosity(Verbosity::Silent),
            ..BuildOptions::default()
        }
    }

    fn source(dir: &Path, yaml: &str) -> ScriptSource {
        let path = dir.join("stepwise.yml");
        std::fs::write(&path, yaml).unwrap();
        ScriptSource::load(&path).unwrap()
    }

    #[test]
    fn test_second_build_is_served_from_cache() {
        let work = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let source = source(work.path(), "tasks:\n  hello:\n    run: \"true\"\n");

        let first = build(&source, &options(Some(cache.path())), &YamlCompiler, &ToolResolver::new())
            .unwrap();
        let second = build(&source, &options(Some(cache.path())), &YamlCompiler, &ToolResolver::new())
            .unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.cache_key, second.cache_key);
        assert_eq!(first.entry.artifact, second.entry.artifact);
    }

    #[test]
    fn test_structural_error_stops_build() {
        let work = TempDir::new().unwrap();
        let source = source(
            work.path(),
            "tasks:\n  a: { deps: [b] }\n  b: { deps: [a] }\n",
        );

        let result = build(&source, &options(None), &YamlCompiler, &ToolResolver::new());
        assert!(matches!(
            result,
            Err(StepwiseError::Structural(StructuralError::CyclicDependency { .. }))
        ));
    }

    #[test]
    fn test_commands_run_in_script_directory() {
        let work = TempDir::new().unwrap();
        let source = source(
            work.path(),
            r#"
tasks:
  write:
    params:
      - { name: file, default: out.txt }
    run: "echo $(mode) > ${file}"
"#,
        );

        let built = build(&source, &options(None), &YamlCompiler, &ToolResolver::new()).unwrap();
        built
            .registry
            .invoke("write", &[TaskArgument::named("file", "mode.txt")])
            .unwrap();

        let written = std::fs::read_to_string(work.path().join("mode.txt")).unwrap();
        assert_eq!(written, "release\n");
    }
}
