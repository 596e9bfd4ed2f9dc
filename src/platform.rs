//! Runner platform detection
//!
//! Cache keys are scoped by the runner's operating system so that
//! binaries built on one platform are never restored on another.

use std::fmt;

/// Detected runner platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux runners
    Linux,
    /// macOS runners
    MacOS,
    /// Windows runners
    Windows,
    /// Anything else, tagged with the raw OS name
    Other(&'static str),
}

impl Platform {
    /// Detect the current platform
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map a Rust OS name onto a platform
    pub fn from_os(os: &'static str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOS,
            "windows" => Platform::Windows,
            other => Platform::Other(other),
        }
    }

    /// Tag used as the first segment of cache keys.
    ///
    /// Uses the names CI runners report (`linux`, `darwin`, `win32`) so keys
    /// line up with caches written by other tooling on the same runners.
    pub fn tag(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::MacOS => "darwin",
            Platform::Windows => "win32",
            Platform::Other(os) => os,
        }
    }

    /// Whether `update-alternatives` is expected to exist
    pub fn supports_alternatives(&self) -> bool {
        matches!(self, Platform::Linux)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_tags() {
        assert_eq!(Platform::Linux.tag(), "linux");
        assert_eq!(Platform::MacOS.tag(), "darwin");
        assert_eq!(Platform::Windows.tag(), "win32");
        assert_eq!(Platform::from_os("freebsd").tag(), "freebsd");
    }

    #[test]
    fn platform_detect_is_stable() {
        assert_eq!(Platform::detect(), Platform::detect());
    }

    #[test]
    fn alternatives_only_on_linux() {
        assert!(Platform::Linux.supports_alternatives());
        assert!(!Platform::MacOS.supports_alternatives());
    }
}
