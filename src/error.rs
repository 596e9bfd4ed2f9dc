//! Error types for canvas-setup
//!
//! All modules use `SetupResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for canvas-setup operations
pub type SetupResult<T> = Result<T, SetupError>;

/// All errors that can occur while setting up a job
#[derive(Error, Debug)]
pub enum SetupError {
    // Environment errors
    #[error("Home directory could not be determined")]
    HomeNotFound,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // Hashing errors
    #[error("Invalid glob pattern {pattern}: {reason}")]
    GlobPattern { pattern: String, reason: String },

    #[error("Failed to hash {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Cache store errors
    #[error("Cache entry already exists for key: {0}")]
    CacheKeyExists(String),

    #[error("None of the cache paths exist: {0}")]
    CachePathsMissing(String),

    #[error("Cache store error: {0}")]
    CacheStore(String),

    // Archive errors
    #[error("Download failed: {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Failed to extract archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed to start: {command}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed: {command}, exit code: {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("Command wrote to stderr: {command}: {stderr}")]
    CommandStderr { command: String, stderr: String },

    #[error("Process terminated by signal: {0}")]
    ProcessSignaled(String),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SetupError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a spawn error for a command that never ran
    pub fn command_spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandSpawn {
            command: command.into(),
            source,
        }
    }

    /// Whether this error is the benign "key already saved" race
    pub fn is_key_conflict(&self) -> bool {
        matches!(self, Self::CacheKeyExists(_))
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::HomeNotFound => Some("Set HOME or [paths] home in the config file"),
            Self::ConfigInvalid { .. } => Some("Check the TOML syntax of the config file"),
            Self::CacheKeyExists(_) => Some("Another job saved this key first; the entry is reusable as is"),
            Self::CommandSpawn { .. } => Some("Check that the tool is installed and on PATH"),
            _ => None,
        }
    }
}
