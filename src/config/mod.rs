//! Configuration management for canvas-setup

pub mod schema;

pub use schema::Config;

use crate::error::{SetupError, SetupResult};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Configuration manager
pub struct ConfigManager {
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Config manager that always yields defaults
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: Some(path),
        }
    }

    /// Load configuration, falling back to defaults when there is no file
    pub async fn load(&self) -> SetupResult<Config> {
        match self.config_path {
            Some(ref path) if path.exists() => self.load_from_file(path).await,
            Some(ref path) => {
                debug!("Config file {} not found, using defaults", path.display());
                Ok(Config::default())
            }
            None => Ok(Config::default()),
        }
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> SetupResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| SetupError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| SetupError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get the config file path
    pub fn path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

impl Config {
    /// Workspace root the project directory is relative to
    pub fn workspace_root(&self) -> SetupResult<PathBuf> {
        if let Some(ref path) = self.paths.workspace {
            return Ok(path.clone());
        }
        if let Some(path) = env_path("GITHUB_WORKSPACE") {
            return Ok(path);
        }
        env::current_dir().map_err(|e| SetupError::io("getting current directory", e))
    }

    /// Home directory holding tool caches and the SDK
    pub fn home_dir(&self) -> SetupResult<PathBuf> {
        self.paths
            .home
            .clone()
            .or_else(dirs::home_dir)
            .ok_or(SetupError::HomeNotFound)
    }

    /// Cache store directory
    pub fn store_dir(&self) -> SetupResult<PathBuf> {
        match self.cache.store_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => Ok(self.home_dir()?.join(".cache").join("canvas-setup").join("store")),
        }
    }

    /// File carrying job state from the pre to the post phase.
    ///
    /// Without `RUNNER_TEMP` the shared temp dir is used, scoped by run,
    /// attempt and job when those are known.
    pub fn state_file(&self) -> PathBuf {
        if let Some(ref file) = self.state.file {
            return file.clone();
        }
        if let Some(dir) = env_path("RUNNER_TEMP") {
            return dir.join("canvas-setup").join("state.json");
        }

        let job: Vec<String> = ["GITHUB_RUN_ID", "GITHUB_RUN_ATTEMPT", "GITHUB_JOB"]
            .iter()
            .filter_map(|name| env::var(name).ok().filter(|v| !v.is_empty()))
            .collect();
        let mut dir = env::temp_dir().join("canvas-setup");
        if !job.is_empty() {
            dir = dir.join(job.join("-"));
        }
        dir.join("state.json")
    }

    /// Step output file, if the runner provides one
    pub fn output_file(&self) -> Option<PathBuf> {
        self.state
            .output_file
            .clone()
            .or_else(|| env_path("GITHUB_OUTPUT"))
    }
}
