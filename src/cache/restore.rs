//! Reference restore cache
//!
//! Remembers the outcome of resolving a script's external references. As long
//! as the set of requested references is unchanged, the previous outcome is
//! reused and the underlying resolver is never consulted.

use crate::cache::atomic::write_atomic;
use crate::compiler::{ReferenceResolver, ResolvedReference};
use crate::error::{CacheError, CacheResult, CompileError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const RESTORE_FILE: &str = "restore.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RestoreRecord {
    /// Requested references, sorted and deduplicated
    references: Vec<String>,
    resolved: Vec<ResolvedReference>,
}

/// A [`ReferenceResolver`] that reuses a recorded resolution
pub struct RestoreCache<'a> {
    record: PathBuf,
    inner: &'a dyn ReferenceResolver,
}

impl<'a> RestoreCache<'a> {
    /// `script_dir` is the per-script directory under the cache root
    pub fn new(script_dir: &Path, inner: &'a dyn ReferenceResolver) -> Self {
        RestoreCache {
            record: script_dir.join(RESTORE_FILE),
            inner,
        }
    }

    fn load(&self) -> CacheResult<Option<RestoreRecord>> {
        let bytes = match fs::read(&self.record) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&self.record, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::corrupt(&self.record, e.to_string()))
    }

    fn save(&self, record: &RestoreRecord) -> CacheResult<()> {
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| CacheError::corrupt(&self.record, e.to_string()))?;
        write_atomic(&self.record, &bytes)
    }
}

fn requested_set(references: &[String]) -> Vec<String> {
    let mut set = references.to_vec();
    set.sort();
    set.dedup();
    set
}

impl ReferenceResolver for RestoreCache<'_> {
    fn resolve(&self, references: &[String]) -> Result<Vec<ResolvedReference>, CompileError> {
        let requested = requested_set(references);

        match self.load() {
            Ok(Some(record)) if record.references == requested => {
                tracing::debug!(count = requested.len(), "Reusing restored references");
                return Ok(record.resolved);
            }
            Ok(Some(_)) => tracing::debug!("Requested references changed, restoring again"),
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable restore record: {}", e),
        }

        let resolved = self.inner.resolve(references)?;
        let record = RestoreRecord {
            references: requested,
            resolved,
        };
        if let Err(e) = self.save(&record) {
            tracing::warn!("Failed to record restored references: {}", e);
        }
        Ok(record.resolved)
    }
}
