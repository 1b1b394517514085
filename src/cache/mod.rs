//! Build cache
//!
//! Two tiers: a restore record that skips re-resolving unchanged external
//! references, and a content-addressed store of compiled artifacts.

pub mod artifact;
pub mod atomic;
pub mod key;
pub mod restore;

pub use artifact::*;
pub use key::*;
pub use restore::*;

use directories::ProjectDirs;
use std::env;
use std::path::PathBuf;

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "STEPWISE_CACHE_DIR";

/// Cache root from the environment, else the platform cache directory
pub fn default_cache_root() -> Option<PathBuf> {
    if let Some(dir) = env::var_os(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    ProjectDirs::from("", "", "stepwise").map(|dirs| dirs.cache_dir().to_path_buf())
}
