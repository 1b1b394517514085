//! Atomic writes so readers never observe a partially written entry

use crate::error::{CacheError, CacheResult};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

/// Write a file by writing a sibling temporary file and renaming it
pub fn write_atomic(path: &Path, content: &[u8]) -> CacheResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CacheError::corrupt(path, "path has no parent directory"))?;
    fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| CacheError::io(parent, e))?;
    temp.write_all(content)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| CacheError::io(temp.path(), e))?;

    temp.persist(path)
        .map_err(|e| CacheError::io(path, e.error))?;
    Ok(())
}

/// Populate a directory out of place, then move it to `target` in one
/// rename. An existing `target` is replaced.
pub fn publish_dir<F>(target: &Path, populate: F) -> CacheResult<PathBuf>
where
    F: FnOnce(&Path) -> CacheResult<()>,
{
    let parent = target
        .parent()
        .ok_or_else(|| CacheError::corrupt(target, "path has no parent directory"))?;
    fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;

    let staging = Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)
        .map_err(|e| CacheError::io(parent, e))?;

    // The staging directory removes itself if populating fails
    populate(staging.path())?;

    match fs::remove_dir_all(target) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(CacheError::io(target, e)),
    }

    let staged = staging.into_path();
    if let Err(e) = fs::rename(&staged, target) {
        let _ = fs::remove_dir_all(&staged);
        // A concurrent writer published the same entry first
        if target.is_dir() {
            return Ok(target.to_path_buf());
        }
        return Err(CacheError::io(target, e));
    }

    Ok(target.to_path_buf())
}
