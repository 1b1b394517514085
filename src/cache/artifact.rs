//! Compiled artifact cache
//!
//! Entries live at `<root>/<script hash>/<cache key>/` and hold:
//! - `script.artifact` - the compiled plan
//! - `script.symbols` - debug symbols, debug builds only
//! - `references.txt` - resolved reference paths, one per line
//! - `captured.txt` - captured variable names joined by `;`, then their hash
//!
//! An entry whose captured variables no longer hold the values it was
//! compiled with is stale and reported as a miss.

use crate::cache::atomic::publish_dir;
use crate::cache::key::{script_hash, BuildMode, CacheKey, CapturedSet};
use crate::compiler::CompileOutput;
use crate::error::{CacheError, CacheResult};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const ARTIFACT_FILE: &str = "script.artifact";
pub const SYMBOLS_FILE: &str = "script.symbols";
pub const REFERENCES_FILE: &str = "references.txt";
pub const CAPTURED_FILE: &str = "captured.txt";

const CAPTURED_SEPARATOR: char = ';';

/// A stored compilation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub artifact: Vec<u8>,
    pub symbols: Option<Vec<u8>>,
    pub references: Vec<String>,
    pub captured: CapturedSet,
}

impl CacheEntry {
    pub fn from_output(output: &CompileOutput) -> Self {
        CacheEntry {
            artifact: output.artifact.clone(),
            symbols: output.symbols.clone(),
            references: output.references.clone(),
            captured: CapturedSet::from_variables(&output.captured),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactCache { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every entry of one script
    pub fn script_dir(&self, identity: &str) -> PathBuf {
        self.root.join(script_hash(identity))
    }

    pub fn entry_dir(&self, identity: &str, key: &CacheKey) -> PathBuf {
        self.script_dir(identity).join(key.as_str())
    }

    /// Look up an entry, checking captured variables against the process
    /// environment
    pub fn lookup(
        &self,
        identity: &str,
        key: &CacheKey,
        mode: BuildMode,
    ) -> CacheResult<Option<CacheEntry>> {
        self.lookup_with(identity, key, mode, |name| {
            env::var(name).unwrap_or_default()
        })
    }

    pub fn lookup_with<F>(
        &self,
        identity: &str,
        key: &CacheKey,
        mode: BuildMode,
        current_value: F,
    ) -> CacheResult<Option<CacheEntry>>
    where
        F: Fn(&str) -> String,
    {
        let dir = self.entry_dir(identity, key);
        if !dir.is_dir() {
            tracing::debug!(key = %key, "Cache miss");
            return Ok(None);
        }

        let captured = read_captured(&dir.join(CAPTURED_FILE))?;
        if !captured.is_current(&current_value) {
            tracing::info!(
                key = %key,
                variables = %captured.names.join(", "),
                "Cache entry is stale: captured variables changed"
            );
            return Ok(None);
        }

        let artifact = read_required(&dir.join(ARTIFACT_FILE))?;
        let symbols = if mode.is_debug() {
            Some(read_required(&dir.join(SYMBOLS_FILE))?)
        } else {
            None
        };
        let references = read_references(&dir.join(REFERENCES_FILE))?;

        tracing::debug!(key = %key, "Cache hit");
        Ok(Some(CacheEntry {
            artifact,
            symbols,
            references,
            captured,
        }))
    }

    /// Store an entry, replacing any previous entry with the same key
    pub fn store(&self, identity: &str, key: &CacheKey, entry: &CacheEntry) -> CacheResult<PathBuf> {
        let target = self.entry_dir(identity, key);
        let path = publish_dir(&target, |dir| {
            write_file(&dir.join(ARTIFACT_FILE), &entry.artifact)?;
            if let Some(symbols) = &entry.symbols {
                write_file(&dir.join(SYMBOLS_FILE), symbols)?;
            }
            let mut references = entry.references.join("\n");
            if !references.is_empty() {
                references.push('\n');
            }
            write_file(&dir.join(REFERENCES_FILE), references.as_bytes())?;

            let sep = CAPTURED_SEPARATOR.to_string();
            let captured = format!(
                "{}\n{}\n",
                entry.captured.names.join(&sep),
                entry.captured.hash
            );
            write_file(&dir.join(CAPTURED_FILE), captured.as_bytes())
        })?;

        tracing::debug!(key = %key, path = %path.display(), "Stored cache entry");
        Ok(path)
    }
}

fn write_file(path: &Path, content: &[u8]) -> CacheResult<()> {
    fs::write(path, content).map_err(|e| CacheError::io(path, e))
}

fn read_required(path: &Path) -> CacheResult<Vec<u8>> {
    fs::read(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            CacheError::corrupt(path, "file is missing")
        } else {
            CacheError::io(path, e)
        }
    })
}

fn read_text(path: &Path) -> CacheResult<String> {
    String::from_utf8(read_required(path)?)
        .map_err(|_| CacheError::corrupt(path, "file is not valid UTF-8"))
}

fn read_references(path: &Path) -> CacheResult<Vec<String>> {
    Ok(read_text(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

fn read_captured(path: &Path) -> CacheResult<CapturedSet> {
    let text = read_text(path)?;
    let mut lines = text.lines();
    let (Some(names), Some(hash)) = (lines.next(), lines.next()) else {
        return Err(CacheError::corrupt(path, "expected names and hash lines"));
    };

    let hash = hash.trim();
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CacheError::corrupt(path, "invalid captured hash"));
    }

    Ok(CapturedSet {
        names: names
            .split(CAPTURED_SEPARATOR)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect(),
        hash: hash.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::{CapturedVariable, Substitutions};
    use tempfile::TempDir;

    fn entry(captured: &[CapturedVariable], symbols: bool) -> CacheEntry {
        CacheEntry {
            artifact: b"{\"tasks\":[]}".to_vec(),
            symbols: symbols.then(|| b"{}".to_vec()),
            references: vec!["/usr/bin/git".into(), "/usr/bin/make".into()],
            captured: CapturedSet::from_variables(captured),
        }
    }

    fn key(mode: BuildMode) -> CacheKey {
        CacheKey::compute("tasks: {}", &Substitutions::new(), mode)
    }

    #[test]
    fn test_store_then_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp_dir.path());
        let stored = entry(&[], false);

        let path = cache.store("script", &key(BuildMode::Release), &stored).unwrap();
        assert!(path.join(ARTIFACT_FILE).is_file());
        assert!(!path.join(SYMBOLS_FILE).exists());
        assert_eq!(
            fs::read_to_string(path.join(REFERENCES_FILE)).unwrap(),
            "/usr/bin/git\n/usr/bin/make\n"
        );

        let found = cache
            .lookup("script", &key(BuildMode::Release), BuildMode::Release)
            .unwrap();
        assert_eq!(found, Some(stored));
    }

    #[test]
    fn test_missing_entry_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp_dir.path());
        let found = cache
            .lookup("script", &key(BuildMode::Release), BuildMode::Release)
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_debug_entry_carries_symbols() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp_dir.path());
        cache
            .store("script", &key(BuildMode::Debug), &entry(&[], true))
            .unwrap();

        let found = cache
            .lookup("script", &key(BuildMode::Debug), BuildMode::Debug)
            .unwrap()
            .unwrap();
        assert_eq!(found.symbols, Some(b"{}".to_vec()));
    }

    #[test]
    fn test_captured_drift_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp_dir.path());
        let k = key(BuildMode::Release);
        cache
            .store("script", &k, &entry(&[CapturedVariable::new("TAG", "v1")], false))
            .unwrap();

        let captured = fs::read_to_string(cache.entry_dir("script", &k).join(CAPTURED_FILE)).unwrap();
        assert!(captured.starts_with("TAG\n"));

        let same = cache
            .lookup_with("script", &k, BuildMode::Release, |_| "v1".to_string())
            .unwrap();
        assert!(same.is_some());

        let drifted = cache
            .lookup_with("script", &k, BuildMode::Release, |_| "v2".to_string())
            .unwrap();
        assert!(drifted.is_none());
    }

    #[test]
    fn test_damaged_entry_is_reported_as_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp_dir.path());
        let k = key(BuildMode::Release);
        let path = cache.store("script", &k, &entry(&[], false)).unwrap();

        fs::remove_file(path.join(ARTIFACT_FILE)).unwrap();
        let result = cache.lookup("script", &k, BuildMode::Release);
        assert!(matches!(result, Err(CacheError::Corrupt { .. })));

        fs::write(path.join(CAPTURED_FILE), "only-one-line").unwrap();
        let result = cache.lookup("script", &k, BuildMode::Release);
        assert!(matches!(result, Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn test_scripts_do_not_share_entries() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp_dir.path());
        let k = key(BuildMode::Release);
        cache.store("one", &k, &entry(&[], false)).unwrap();

        assert_ne!(cache.script_dir("one"), cache.script_dir("two"));
        assert!(cache.lookup("two", &k, BuildMode::Release).unwrap().is_none());
    }
}
