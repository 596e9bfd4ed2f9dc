//! Content hashing for cache keys
//!
//! Resolves a glob pattern to a file set and folds every file's SHA256
//! into one outer SHA256. Same bytes in the same order = same digest.

use crate::error::{SetupError, SetupResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// SHA256 of empty input, the digest of a pattern that matches nothing
pub const EMPTY_DIGEST: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Resolve a glob pattern to the files it currently matches.
///
/// Directories are dropped. Order is the resolver's enumeration order,
/// which is reproducible for a given filesystem state.
pub fn resolve_files(pattern: &str) -> SetupResult<Vec<PathBuf>> {
    let paths = glob::glob(pattern).map_err(|e| SetupError::GlobPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| SetupError::Hash {
            path: e.path().to_path_buf(),
            source: io::Error::from(e),
        })?;
        if path.is_dir() {
            continue;
        }
        files.push(path);
    }
    Ok(files)
}

/// Stream a single file through SHA256 without buffering it whole
fn hash_file(path: &Path) -> SetupResult<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| SetupError::Hash {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| SetupError::Hash {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(hasher.finalize().to_vec())
}

/// Compute the content digest of every file matched by `pattern`
pub fn hash_files(pattern: &str) -> SetupResult<String> {
    let files = resolve_files(pattern)?;

    let mut outer = Sha256::new();
    for file in &files {
        outer.update(hash_file(file)?);
    }

    let digest = hex::encode(outer.finalize());
    debug!("Hashed {} files for {}: {}", files.len(), pattern, digest);
    Ok(digest)
}
