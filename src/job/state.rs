//! Cross-phase job state
//!
//! Values set during the pre phase and read back in the post phase of
//! the same job. The state is an explicit value handed to both phases;
//! the CLI persists it as JSON between the two processes.

use crate::error::{SetupError, SetupResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Restore prefix of the deferred SDK system cache
pub const EMSDK_SYS_CACHE_RESTORE_KEY: &str = "EMSDK_SYS_CACHE_RESTORE_KEY";

/// Key the SDK system cache was actually restored from
pub const EMSDK_SYS_CACHE_KEY: &str = "EMSDK_SYS_CACHE_KEY";

/// On-disk form of the state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateFile {
    values: BTreeMap<String, String>,
    updated_at: Option<DateTime<Utc>>,
}

/// Key/value context shared by the pre and post phases of one job
#[derive(Debug, Clone, Default)]
pub struct JobState {
    values: BTreeMap<String, String>,
    path: Option<PathBuf>,
}

impl JobState {
    /// State that lives only in memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load state from `path`. A missing file is an empty state.
    pub async fn load(path: impl Into<PathBuf>) -> SetupResult<Self> {
        let path = path.into();

        if !path.exists() {
            debug!("No job state at {}", path.display());
            return Ok(Self {
                values: BTreeMap::new(),
                path: Some(path),
            });
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| SetupError::io(format!("reading job state {}", path.display()), e))?;
        let file: StateFile = serde_json::from_str(&content)?;

        Ok(Self {
            values: file.values,
            path: Some(path),
        })
    }

    /// Load state from `path`, starting over when the file is unreadable.
    ///
    /// The returned state stays bound to `path`, so persisting it replaces
    /// the broken file.
    pub async fn load_or_reset(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(path.clone()).await {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring unreadable job state {}: {}", path.display(), e);
                Self {
                    values: BTreeMap::new(),
                    path: Some(path),
                }
            }
        }
    }

    /// Write state back to its file, if it has one
    pub async fn persist(&self) -> SetupResult<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SetupError::io("creating job state directory", e))?;
        }

        let file = StateFile {
            values: self.values.clone(),
            updated_at: Some(Utc::now()),
        };
        let content = serde_json::to_string_pretty(&file)?;
        fs::write(path, content)
            .await
            .map_err(|e| SetupError::io(format!("writing job state {}", path.display()), e))?;

        debug!("Persisted {} job state values", self.values.len());
        Ok(())
    }

    /// Get a value. Empty values read as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Set a value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Remove a value
    pub fn clear(&mut self, name: &str) {
        self.values.remove(name);
    }

    /// Whether nothing has been set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
