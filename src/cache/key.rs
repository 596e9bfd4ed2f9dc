//! Cache key derivation
//!
//! A key has two parts: a stable restore prefix shared by every entry of
//! a domain on one platform, and the full key with the content digest
//! appended.

use crate::cache::hasher::hash_files;
use crate::error::SetupResult;
use std::fmt;

/// Restore prefix: `{platform}-{domain}[-{version}]-`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    /// Build the prefix for a domain on a platform
    pub fn new(platform: &str, domain: &str, version: Option<&str>) -> Self {
        let prefix = match version {
            Some(version) if !version.is_empty() => format!("{platform}-{domain}-{version}-"),
            _ => format!("{platform}-{domain}-"),
        };
        Self(prefix)
    }

    /// Wrap a prefix read back from job state
    pub fn from_raw(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    /// Combine with a precomputed digest
    pub fn with_digest(&self, digest: &str) -> CacheKey {
        CacheKey {
            full: format!("{}{}", self.0, digest),
            prefix: self.clone(),
        }
    }

    /// Hash `pattern` and combine the digest with this prefix
    pub fn build(&self, pattern: &str) -> SetupResult<CacheKey> {
        Ok(self.with_digest(&hash_files(pattern)?))
    }

    /// Key with no digest, used to look up entries whose content is unknown
    pub fn bare(&self) -> CacheKey {
        self.with_digest("")
    }

    /// The prefix string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully derived cache key. `full` always starts with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    prefix: KeyPrefix,
    full: String,
}

impl CacheKey {
    /// The restore prefix
    pub fn prefix(&self) -> &KeyPrefix {
        &self.prefix
    }

    /// The exact key including the content digest
    pub fn full(&self) -> &str {
        &self.full
    }

    /// The digest portion of the key
    pub fn digest(&self) -> &str {
        &self.full[self.prefix.as_str().len()..]
    }

    /// Whether a restored key is exactly this key
    pub fn matches(&self, restored: Option<&str>) -> bool {
        restored == Some(self.full.as_str())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// Derive the key for `domain` from the files matched by `pattern`
pub fn build_key(
    domain: &str,
    platform: &str,
    version: Option<&str>,
    pattern: &str,
) -> SetupResult<CacheKey> {
    KeyPrefix::new(platform, domain, version).build(pattern)
}
