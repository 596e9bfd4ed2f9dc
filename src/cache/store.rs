//! Blob cache store
//!
//! `CacheStore` is the seam to whatever keeps cache archives between jobs.
//! `LocalCacheStore` keeps them in a directory (a runner-mounted volume or
//! a shared disk), one gzip'd tar per key:
//!
//! ```text
//! <root>/entries/<id>/meta.json
//! <root>/entries/<id>/archive.tar.gz
//! ```
//!
//! Entries are immutable. Saving a key that already exists fails with
//! `SetupError::CacheKeyExists`.

use crate::error::{SetupError, SetupResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder};
use tracing::{debug, warn};

const ENTRIES_DIR: &str = "entries";
const META_FILE: &str = "meta.json";
const ARCHIVE_FILE: &str = "archive.tar.gz";

/// Abstract cache store interface
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Restore `paths` from the entry under `key`, falling back to the newest
    /// entry whose key starts with one of `restore_keys` (tried in order).
    ///
    /// Returns the key that was actually restored.
    async fn restore(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
    ) -> SetupResult<Option<String>>;

    /// Save `paths` under `key`, returning the store's id for the entry
    async fn save(&self, paths: &[PathBuf], key: &str) -> SetupResult<String>;

    /// Human-readable store name for logs
    fn store_name(&self) -> &'static str;
}

/// Metadata written next to every archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Exact cache key
    pub key: String,
    /// Paths the archive was built from, in archive index order
    pub paths: Vec<PathBuf>,
    /// When the entry was saved
    pub created_at: DateTime<Utc>,
    /// Archive size in bytes
    pub size_bytes: u64,
}

/// Directory-backed cache store
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    root: PathBuf,
}

impl LocalCacheStore {
    /// Create a store rooted at `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entry id for a key: first 16 hex chars of its SHA256
    pub fn entry_id(key: &str) -> String {
        hex::encode(&Sha256::digest(key.as_bytes())[..8])
    }

    fn entries_dir(root: &Path) -> PathBuf {
        root.join(ENTRIES_DIR)
    }

    /// List all finalized entries
    pub fn list(&self) -> SetupResult<Vec<EntryMeta>> {
        list_entries(&self.root)
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn restore(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
    ) -> SetupResult<Option<String>> {
        let root = self.root.clone();
        let paths = paths.to_vec();
        let key = key.to_string();
        let restore_keys = restore_keys.to_vec();

        tokio::task::spawn_blocking(move || restore_blocking(&root, &paths, &key, &restore_keys))
            .await
            .map_err(|e| SetupError::Internal(format!("Cache restore task failed: {}", e)))?
    }

    async fn save(&self, paths: &[PathBuf], key: &str) -> SetupResult<String> {
        let root = self.root.clone();
        let paths = paths.to_vec();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || save_blocking(&root, &paths, &key))
            .await
            .map_err(|e| SetupError::Internal(format!("Cache save task failed: {}", e)))?
    }

    fn store_name(&self) -> &'static str {
        "local"
    }
}

fn list_entries(root: &Path) -> SetupResult<Vec<EntryMeta>> {
    let dir = LocalCacheStore::entries_dir(root);
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut metas = Vec::new();
    let entries = fs::read_dir(&dir)
        .map_err(|e| SetupError::io(format!("reading {}", dir.display()), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SetupError::io("reading cache entry", e))?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        let meta_path = entry.path().join(META_FILE);
        match fs::read_to_string(&meta_path) {
            Ok(content) => match serde_json::from_str::<EntryMeta>(&content) {
                Ok(meta) => metas.push(meta),
                Err(e) => warn!("Ignoring corrupt cache entry {}: {}", meta_path.display(), e),
            },
            Err(e) => debug!("Skipping {}: {}", meta_path.display(), e),
        }
    }
    Ok(metas)
}

/// Find the entry to restore: exact key first, then newest prefix match
fn find_entry(root: &Path, key: &str, restore_keys: &[String]) -> SetupResult<Option<EntryMeta>> {
    let metas = list_entries(root)?;

    if let Some(exact) = metas.iter().find(|m| m.key == key) {
        return Ok(Some(exact.clone()));
    }

    for prefix in restore_keys {
        let newest = metas
            .iter()
            .filter(|m| m.key.starts_with(prefix.as_str()))
            .max_by_key(|m| m.created_at);
        if let Some(meta) = newest {
            return Ok(Some(meta.clone()));
        }
    }

    Ok(None)
}

fn restore_blocking(
    root: &Path,
    paths: &[PathBuf],
    key: &str,
    restore_keys: &[String],
) -> SetupResult<Option<String>> {
    let Some(meta) = find_entry(root, key, restore_keys)? else {
        return Ok(None);
    };

    let archive_path = LocalCacheStore::entries_dir(root)
        .join(LocalCacheStore::entry_id(&meta.key))
        .join(ARCHIVE_FILE);
    debug!("Restoring {} from {}", meta.key, archive_path.display());

    unpack_archive(&archive_path, paths).map_err(|source| SetupError::Archive {
        path: archive_path.clone(),
        source,
    })?;

    Ok(Some(meta.key))
}

/// Unpack an archive whose top-level components are indexes into `paths`
fn unpack_archive(archive_path: &Path, paths: &[PathBuf]) -> io::Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();

        let mut components = entry_path.components();
        let index = match components.next() {
            Some(Component::Normal(first)) => first.to_string_lossy().parse::<usize>().ok(),
            _ => None,
        };
        let Some(base) = index.and_then(|i| paths.get(i)) else {
            debug!("Skipping archive entry {}", entry_path.display());
            continue;
        };

        let rest = components.as_path();
        if rest.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsafe archive entry: {}", entry_path.display()),
            ));
        }

        let dest = base.join(rest);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest)?;
    }

    Ok(())
}

fn save_blocking(root: &Path, paths: &[PathBuf], key: &str) -> SetupResult<String> {
    let id = LocalCacheStore::entry_id(key);
    let entries_dir = LocalCacheStore::entries_dir(root);
    let final_dir = entries_dir.join(&id);

    if final_dir.exists() {
        return Err(SetupError::CacheKeyExists(key.to_string()));
    }

    if !paths.iter().any(|p| p.exists()) {
        let joined: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        return Err(SetupError::CachePathsMissing(joined.join(", ")));
    }

    let tmp_dir = entries_dir.join(format!(".tmp-{}-{}", id, std::process::id()));
    fs::create_dir_all(&tmp_dir)
        .map_err(|e| SetupError::io(format!("creating {}", tmp_dir.display()), e))?;

    let result = write_entry(&tmp_dir, paths, key).and_then(|()| {
        fs::rename(&tmp_dir, &final_dir).map_err(|e| {
            if final_dir.exists() {
                SetupError::CacheKeyExists(key.to_string())
            } else {
                SetupError::io(format!("finalizing cache entry {}", final_dir.display()), e)
            }
        })
    });

    if result.is_err() {
        let _ = fs::remove_dir_all(&tmp_dir);
    }
    result?;

    debug!("Saved cache entry {} for {}", id, key);
    Ok(id)
}

fn write_entry(dir: &Path, paths: &[PathBuf], key: &str) -> SetupResult<()> {
    let archive_path = dir.join(ARCHIVE_FILE);
    let to_archive_err = |source: io::Error| SetupError::Archive {
        path: archive_path.clone(),
        source,
    };

    let file = File::create(&archive_path).map_err(to_archive_err)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);

    for (index, path) in paths.iter().enumerate() {
        let name = index.to_string();
        if path.is_dir() {
            builder.append_dir_all(&name, path).map_err(to_archive_err)?;
        } else if path.is_file() {
            builder
                .append_path_with_name(path, &name)
                .map_err(to_archive_err)?;
        } else {
            warn!("Cache path {} does not exist, skipping", path.display());
        }
    }

    let encoder = builder.into_inner().map_err(to_archive_err)?;
    encoder.finish().map_err(to_archive_err)?;

    let size_bytes = fs::metadata(&archive_path)
        .map(|m| m.len())
        .map_err(to_archive_err)?;

    let meta = EntryMeta {
        key: key.to_string(),
        paths: paths.to_vec(),
        created_at: Utc::now(),
        size_bytes,
    };
    let meta_path = dir.join(META_FILE);
    fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)
        .map_err(|e| SetupError::io(format!("writing {}", meta_path.display()), e))?;

    Ok(())
}
