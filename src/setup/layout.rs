//! Job inputs and the directory layout derived from them

use std::path::{Path, PathBuf};

/// Architecture selector meaning "every architecture"
pub const ALL_ARCHES: &str = "ALL";

/// User-supplied inputs of a setup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupInputs {
    /// Project directory relative to the workspace root
    pub canvas_home: PathBuf,
    /// Prebuilt library architecture, or `ALL`
    pub arch: String,
    /// Emscripten SDK version; `None` disables the SDK steps
    pub emsdk_version: Option<String>,
}

impl SetupInputs {
    /// Whether libraries for every architecture are wanted
    pub fn all_arches(&self) -> bool {
        self.arch == ALL_ARCHES
    }
}

/// Resolved directories for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Workspace root
    pub workspace_root: PathBuf,
    /// Home directory
    pub home: PathBuf,
    /// Project directory (`workspace_root/canvas_home`)
    pub canvas_path: PathBuf,
}

impl Layout {
    /// Resolve the layout for a project under `workspace_root`
    pub fn new(workspace_root: impl Into<PathBuf>, home: impl Into<PathBuf>, canvas_home: &Path) -> Self {
        let workspace_root = workspace_root.into();
        Self {
            canvas_path: workspace_root.join(canvas_home),
            workspace_root,
            home: home.into(),
        }
    }

    /// Prebuilt library directory
    pub fn libs_dir(&self) -> PathBuf {
        self.canvas_path.join("libs")
    }

    /// pip's download cache
    pub fn pip_cache_dir(&self) -> PathBuf {
        self.home.join(".cache").join("pip")
    }

    /// Emscripten SDK checkout
    pub fn emsdk_home(&self) -> PathBuf {
        self.home.join("emsdk-master")
    }

    /// Emscripten's system library cache, filled in by the build
    pub fn emsdk_sys_cache(&self) -> PathBuf {
        self.emsdk_home().join("upstream").join("emscripten").join("cache")
    }

    /// Where downloads are staged before extraction
    pub fn download_dir(&self) -> PathBuf {
        self.home.join(".cache").join("canvas-setup").join("downloads")
    }

    /// Glob selecting the ETAG metadata that identifies synced libraries
    pub fn libs_content_pattern(&self, arch: &str) -> String {
        let libs = self.libs_dir();
        if arch == ALL_ARCHES {
            format!("{}/**/ETAG", libs.display())
        } else {
            format!("{}/**/{}/*/ETAG", libs.display(), arch)
        }
    }

    /// Glob selecting everything in the SDK system cache
    pub fn emsdk_sys_cache_pattern(&self) -> String {
        format!("{}/**/*", self.emsdk_sys_cache().display())
    }
}
