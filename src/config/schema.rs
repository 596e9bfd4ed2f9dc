//! Configuration schema for canvas-setup
//!
//! Every section is optional; CI jobs usually run without a config file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default emsdk source archive
pub const DEFAULT_EMSDK_ARCHIVE_URL: &str =
    "https://github.com/emscripten-core/emsdk/archive/master.tar.gz";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Filesystem locations
    pub paths: PathsConfig,

    /// Cache store settings
    pub cache: CacheConfig,

    /// Cross-phase state and outputs
    pub state: StateConfig,

    /// Compiler alternative registration
    pub toolchain: ToolchainConfig,

    /// Emscripten SDK bootstrap
    pub emsdk: EmsdkConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Filesystem locations. Unset values come from the runner environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Workspace root (default: `GITHUB_WORKSPACE`, then the current directory)
    pub workspace: Option<PathBuf>,

    /// Home directory (default: the user's home)
    pub home: Option<PathBuf>,
}

/// Cache store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding cache entries (default: `<home>/.cache/canvas-setup/store`)
    pub store_dir: Option<PathBuf>,
}

/// Cross-phase state settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// JSON file carrying state from pre to post
    /// (default: `<RUNNER_TEMP>/canvas-setup/state.json`)
    pub file: Option<PathBuf>,

    /// Step output file (default: `GITHUB_OUTPUT`; stdout when unset)
    pub output_file: Option<PathBuf>,
}

/// Compiler alternative settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Register the compiler alternative at all
    pub enabled: bool,

    /// Compiler to register as `c++`
    pub compiler: PathBuf,

    /// Alternatives priority
    pub priority: u32,

    /// Run `update-alternatives` through sudo
    pub sudo: bool,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compiler: PathBuf::from("/usr/bin/clang++"),
            priority: 100,
            sudo: true,
        }
    }
}

/// Emscripten SDK bootstrap settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmsdkConfig {
    /// Where to fetch emsdk from when it is not installed
    pub archive_url: String,
}

impl Default for EmsdkConfig {
    fn default() -> Self {
        Self {
            archive_url: DEFAULT_EMSDK_ARCHIVE_URL.to_string(),
        }
    }
}
