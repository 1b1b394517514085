//! Script file discovery and loading

use crate::config::types::ScriptFile;
use crate::error::{ConfigError, ConfigResult};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default script file names to search for
const SCRIPT_FILE_NAMES: &[&str] = &["stepwise.yml", "stepwise.yaml"];

/// Find the script file by searching current and parent directories
pub fn find_script_file() -> ConfigResult<PathBuf> {
    find_script_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the script file starting from a specific directory
pub fn find_script_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in SCRIPT_FILE_NAMES {
            let script_path = current_dir.join(file_name);
            searched_paths.push(script_path.display().to_string());

            if script_path.is_file() {
                return Ok(script_path);
            }
        }

        // Try parent directory
        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// One parsed script file
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub text: String,
    pub script: ScriptFile,
}

/// A script plus every sibling script it loads, transitively
#[derive(Debug, Clone)]
pub struct ScriptSource {
    identity: String,
    dir: PathBuf,
    files: Vec<LoadedFile>,
}

impl ScriptSource {
    /// Load a script file and its `load:` siblings.
    ///
    /// Siblings resolve relative to the file that loads them; a file already
    /// loaded (by canonical path) is not loaded again.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let root = canonical(path)?;
        let dir = root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut files = Vec::new();
        let mut seen = HashSet::new();
        let mut pending = vec![root.clone()];
        seen.insert(root.clone());

        while let Some(file_path) = pending.pop() {
            let text = fs::read_to_string(&file_path).map_err(|e| ConfigError::Read {
                path: file_path.clone(),
                error: e.to_string(),
            })?;
            let script = parse_script(&text, &file_path)?;

            let base = file_path.parent().unwrap_or_else(|| Path::new("."));
            // Reverse so siblings are visited in declaration order
            for sibling in script.load.iter().rev() {
                let sibling_path = base.join(sibling);
                let resolved = canonical(&sibling_path).map_err(|_| ConfigError::LoadFile {
                    path: sibling_path.clone(),
                    error: "file not found".to_string(),
                })?;
                if seen.insert(resolved.clone()) {
                    pending.push(resolved);
                }
            }

            files.push(LoadedFile {
                path: file_path,
                text,
                script,
            });
        }

        Ok(ScriptSource {
            identity: root.display().to_string(),
            dir,
            files,
        })
    }

    /// Build a source from in-memory text. `load:` entries are ignored.
    pub fn from_text(identity: &str, text: &str, dir: &Path) -> ConfigResult<Self> {
        let path = dir.join(identity);
        let script = parse_script(text, &path)?;
        Ok(ScriptSource {
            identity: identity.to_string(),
            dir: dir.to_path_buf(),
            files: vec![LoadedFile {
                path,
                text: text.to_string(),
                script,
            }],
        })
    }

    /// Stable identity of the script, used to key its cache directory
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Directory commands run in by default
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The main file followed by its siblings in load order
    pub fn files(&self) -> &[LoadedFile] {
        &self.files
    }

    /// The main script file
    pub fn main(&self) -> &ScriptFile {
        &self.files[0].script
    }

    /// Text of every loaded file, each prefixed with its path, for hashing
    pub fn combined_text(&self) -> String {
        let mut combined = String::new();
        for file in &self.files {
            combined.push_str("# file: ");
            combined.push_str(&file.path.display().to_string());
            combined.push('\n');
            combined.push_str(&file.text);
            combined.push('\n');
        }
        combined
    }
}

/// Parse a script from a string
pub fn parse_script(yaml: &str, path: &Path) -> ConfigResult<ScriptFile> {
    serde_yaml::from_str(yaml).map_err(|e| ConfigError::Yaml {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

fn canonical(path: &Path) -> ConfigResult<PathBuf> {
    fs::canonicalize(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}
