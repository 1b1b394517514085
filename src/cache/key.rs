//! Cache key generation
//!
//! Keys are content-addressed: the same script text, substitutions and build
//! mode always produce the same key, independent of the order substitutions
//! were supplied in or the casing of their names.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Number of hex characters kept from a SHA-256 digest
const KEY_LENGTH: usize = 16;

fn short_hex(hasher: Sha256) -> String {
    let hash = hex::encode(hasher.finalize());
    hash[..KEY_LENGTH].to_string()
}

/// Build flavour; debug builds also emit a symbols file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildMode {
    #[default]
    Release,
    Debug,
}

impl BuildMode {
    pub fn is_debug(self) -> bool {
        self == BuildMode::Debug
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Release => f.write_str("release"),
            BuildMode::Debug => f.write_str("debug"),
        }
    }
}

/// Named compile-time substitutions. Names are case-insensitive and kept
/// lower-cased and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    values: BTreeMap<String, String>,
}

impl Substitutions {
    pub fn new() -> Self {
        Substitutions::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.trim().to_lowercase(), value.into());
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&name.trim().to_lowercase()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse a `KEY=VALUE` definition
    pub fn parse_definition(definition: &str) -> Option<(String, String)> {
        let (name, value) = definition.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), value.to_string()))
    }
}

/// Content-addressed key of one compiled artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hash script text, normalized substitutions and build mode
    pub fn compute(script_text: &str, substitutions: &Substitutions, mode: BuildMode) -> Self {
        let mut hasher = Sha256::new();

        hasher.update(script_text.as_bytes());
        hasher.update([0u8]);

        for (name, value) in substitutions.iter() {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        hasher.update([0u8]);

        hasher.update(mode.to_string().as_bytes());

        CacheKey(short_hex(hasher))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash of a script's identity, naming its directory under the cache root
pub fn script_hash(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    short_hex(hasher)
}

/// A value read from the environment and inlined at compile time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedVariable {
    pub name: String,
    pub value: String,
}

impl CapturedVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        CapturedVariable {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Names of the captured variables of an entry plus one hash over their
/// values, so stored entries do not duplicate the raw values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedSet {
    pub names: Vec<String>,
    pub hash: String,
}

impl CapturedSet {
    pub fn from_variables(variables: &[CapturedVariable]) -> Self {
        let values: BTreeMap<&str, &str> = variables
            .iter()
            .map(|v| (v.name.as_str(), v.value.as_str()))
            .collect();
        CapturedSet {
            names: values.keys().map(|k| k.to_string()).collect(),
            hash: hash_values(values.into_iter()),
        }
    }

    /// Recompute the hash from the current values and compare
    pub fn is_current<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> String,
    {
        let current: Vec<(String, String)> = self
            .names
            .iter()
            .map(|name| (name.clone(), lookup(name)))
            .collect();
        let current_hash = hash_values(current.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        current_hash == self.hash
    }
}

fn hash_values<'a>(values: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in values {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    short_hex(hasher)
}
