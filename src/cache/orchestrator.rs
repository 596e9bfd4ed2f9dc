//! Restore / install / save orchestration per cache domain
//!
//! Each domain goes through
//! `NotRestored -> Restored(matched) -> Installed -> {Saved | Skipped}`.
//! The install step always runs: a restored cache only warms the tool's
//! own cache, it does not replace the install's side effects.
//!
//! Saving is never fatal. Concurrent jobs race to save the same key and
//! losing that race is expected, so save errors surface as
//! `SaveOutcome::Conflict` / `SaveOutcome::Failed` instead of `Err`.

use crate::cache::key::{CacheKey, KeyPrefix};
use crate::cache::store::CacheStore;
use crate::error::{SetupError, SetupResult};
use crate::job::{JobState, EMSDK_SYS_CACHE_KEY, EMSDK_SYS_CACHE_RESTORE_KEY};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// When a domain's content digest can be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestTiming {
    /// Content-defining files exist before install (lockfiles)
    BeforeInstall,
    /// Content is only known once install/sync has run; the key is
    /// recomputed after install
    AfterInstall,
}

/// One logical cache concern
#[derive(Debug, Clone)]
pub struct CacheDomain {
    /// Name used in log lines ("yarn", "pip", ...)
    pub label: String,
    /// Restore prefix
    pub prefix: KeyPrefix,
    /// Directories archived into the cache entry
    pub paths: Vec<PathBuf>,
    /// Glob pattern whose files define the cache content
    pub content_pattern: String,
    /// When the digest is taken
    pub timing: DigestTiming,
}

/// Lifecycle position of a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainPhase {
    NotRestored,
    Restored,
    Installed,
    Saved,
    Skipped,
}

impl fmt::Display for DomainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotRestored => "not-restored",
            Self::Restored => "restored",
            Self::Installed => "installed",
            Self::Saved => "saved",
            Self::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Result of the conditional save step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Content saved under `key`
    Saved { key: String, cache_id: String },
    /// Restored key already matches, nothing to save
    Skipped { key: String },
    /// Another job saved `key` first
    Conflict { key: String },
    /// Save failed for another reason; logged and ignored
    Failed { key: String, reason: String },
}

impl SaveOutcome {
    /// Whether a save call was issued to the store
    pub fn save_attempted(&self) -> bool {
        !matches!(self, Self::Skipped { .. })
    }

    /// Terminal lifecycle phase for this outcome
    pub fn phase(&self) -> DomainPhase {
        match self {
            Self::Skipped { .. } => DomainPhase::Skipped,
            _ => DomainPhase::Saved,
        }
    }
}

/// What happened to one domain
#[derive(Debug, Clone)]
pub struct DomainReport {
    /// Domain label
    pub label: String,
    /// Key the cache was restored from, if any
    pub restored: Option<String>,
    /// Save decision
    pub outcome: SaveOutcome,
}

impl DomainReport {
    /// Terminal lifecycle phase
    pub fn phase(&self) -> DomainPhase {
        self.outcome.phase()
    }
}

/// Drives domains against a cache store
pub struct CacheOrchestrator<'a> {
    store: &'a dyn CacheStore,
}

impl<'a> CacheOrchestrator<'a> {
    /// Create an orchestrator over `store`
    pub fn new(store: &'a dyn CacheStore) -> Self {
        Self { store }
    }

    /// Hash off the async runtime; files may be large
    async fn derive_key(prefix: &KeyPrefix, pattern: &str) -> SetupResult<CacheKey> {
        let prefix = prefix.clone();
        let pattern = pattern.to_string();
        tokio::task::spawn_blocking(move || prefix.build(&pattern))
            .await
            .map_err(|e| SetupError::Internal(format!("Hash task failed: {}", e)))?
    }

    /// Restore by exact key with the prefix as fallback.
    ///
    /// Store errors are logged and read as a miss.
    pub async fn restore(&self, label: &str, paths: &[PathBuf], key: &CacheKey) -> Option<String> {
        let prefix = key.prefix().as_str().to_string();
        match self.store.restore(paths, key.full(), &[prefix.clone()]).await {
            Ok(Some(matched)) => {
                info!("Restored {} cache from cache key: {}", label, matched);
                Some(matched)
            }
            Ok(None) => {
                info!("Did not find {} cache using restore key: {}", label, prefix);
                None
            }
            Err(e) => {
                warn!("Restoring {} cache failed, continuing without it: {}", label, e);
                None
            }
        }
    }

    /// Save `key` unless it is exactly the key that was restored
    pub async fn save_if_changed(
        &self,
        label: &str,
        paths: &[PathBuf],
        key: &CacheKey,
        restored: Option<&str>,
    ) -> SaveOutcome {
        if key.matches(restored) {
            info!(
                "Skipped saving {} cache because key matches cacheKey: {}",
                label,
                key.full()
            );
            return SaveOutcome::Skipped {
                key: key.full().to_string(),
            };
        }

        match self.store.save(paths, key.full()).await {
            Ok(cache_id) => {
                info!("Saved {} cache using key: {}; cacheId: {}", label, key.full(), cache_id);
                SaveOutcome::Saved {
                    key: key.full().to_string(),
                    cache_id,
                }
            }
            Err(e) if e.is_key_conflict() => {
                warn!("Save cache failed. Ignore and continue... Details: {}", e);
                SaveOutcome::Conflict {
                    key: key.full().to_string(),
                }
            }
            Err(e) => {
                warn!("Save cache failed. Ignore and continue... Details: {}", e);
                SaveOutcome::Failed {
                    key: key.full().to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Run the full lifecycle for one domain.
    ///
    /// `install` always runs; its error aborts the domain before saving.
    pub async fn run<F, Fut>(&self, domain: &CacheDomain, install: F) -> SetupResult<DomainReport>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SetupResult<()>>,
    {
        debug!("{} cache: {}", domain.label, DomainPhase::NotRestored);
        let key = Self::derive_key(&domain.prefix, &domain.content_pattern).await?;

        let restored = self.restore(&domain.label, &domain.paths, &key).await;
        debug!("{} cache: {}", domain.label, DomainPhase::Restored);

        install().await?;
        debug!("{} cache: {}", domain.label, DomainPhase::Installed);

        let key = match domain.timing {
            DigestTiming::BeforeInstall => key,
            DigestTiming::AfterInstall => {
                Self::derive_key(&domain.prefix, &domain.content_pattern).await?
            }
        };

        let outcome = self
            .save_if_changed(&domain.label, &domain.paths, &key, restored.as_deref())
            .await;
        debug!("{} cache: {}", domain.label, outcome.phase());

        Ok(DomainReport {
            label: domain.label.clone(),
            restored,
            outcome,
        })
    }

    /// Pre-phase half of the deferred SDK system cache.
    ///
    /// Content is produced by the build itself, so the lookup uses the bare
    /// prefix and the prefix plus matched key are handed to the post phase
    /// through `state`.
    pub async fn restore_deferred(
        &self,
        label: &str,
        paths: &[PathBuf],
        prefix: &KeyPrefix,
        state: &mut JobState,
    ) -> Option<String> {
        state.set(EMSDK_SYS_CACHE_RESTORE_KEY, prefix.as_str());

        let restored = self.restore(label, paths, &prefix.bare()).await;
        if let Some(ref matched) = restored {
            state.set(EMSDK_SYS_CACHE_KEY, matched.as_str());
        }
        restored
    }

    /// Post-phase half of the deferred SDK system cache.
    ///
    /// Returns `Ok(None)` when the pre phase never recorded a prefix.
    pub async fn finalize_deferred(
        &self,
        label: &str,
        paths: &[PathBuf],
        content_pattern: &str,
        state: &JobState,
    ) -> SetupResult<Option<SaveOutcome>> {
        let Some(prefix) = state.get(EMSDK_SYS_CACHE_RESTORE_KEY) else {
            warn!("Cannot find {}. Give up.", EMSDK_SYS_CACHE_RESTORE_KEY);
            return Ok(None);
        };

        let prefix = KeyPrefix::from_raw(prefix);
        let key = Self::derive_key(&prefix, content_pattern).await?;
        let restored = state.get(EMSDK_SYS_CACHE_KEY);

        Ok(Some(self.save_if_changed(label, paths, &key, restored).await))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::hasher::EMPTY_DIGEST;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory store that records every call
    #[derive(Default)]
    pub(crate) struct RecordingStore {
        pub entries: Mutex<BTreeMap<String, ()>>,
        pub saves: Mutex<Vec<String>>,
        pub fail_restore: bool,
        pub fail_save_with: Option<fn(&str) -> SetupError>,
    }

    impl RecordingStore {
        pub fn with_entry(key: &str) -> Self {
            let store = Self::default();
            store.entries.lock().unwrap().insert(key.to_string(), ());
            store
        }

        pub fn save_count(&self) -> usize {
            self.saves.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CacheStore for RecordingStore {
        async fn restore(
            &self,
            _paths: &[PathBuf],
            key: &str,
            restore_keys: &[String],
        ) -> SetupResult<Option<String>> {
            if self.fail_restore {
                return Err(SetupError::CacheStore("unreachable".into()));
            }
            let entries = self.entries.lock().unwrap();
            if entries.contains_key(key) {
                return Ok(Some(key.to_string()));
            }
            for prefix in restore_keys {
                if let Some(found) = entries.keys().rev().find(|k| k.starts_with(prefix.as_str())) {
                    return Ok(Some(found.clone()));
                }
            }
            Ok(None)
        }

        async fn save(&self, _paths: &[PathBuf], key: &str) -> SetupResult<String> {
            self.saves.lock().unwrap().push(key.to_string());
            if let Some(make_err) = self.fail_save_with {
                return Err(make_err(key));
            }
            let mut entries = self.entries.lock().unwrap();
            if entries.insert(key.to_string(), ()).is_some() {
                return Err(SetupError::CacheKeyExists(key.to_string()));
            }
            Ok(format!("id-{}", entries.len()))
        }

        fn store_name(&self) -> &'static str {
            "recording"
        }
    }

    pub(crate) fn key_exists(key: &str) -> SetupError {
        SetupError::CacheKeyExists(key.to_string())
    }

    fn quota_exceeded(_key: &str) -> SetupError {
        SetupError::CacheStore("quota exceeded".into())
    }

    fn lockfile_domain(dir: &TempDir, timing: DigestTiming) -> CacheDomain {
        CacheDomain {
            label: "yarn".into(),
            prefix: KeyPrefix::new("linux", "yarn-canvas", None),
            paths: vec![dir.path().join("cache")],
            content_pattern: format!("{}/yarn.lock", dir.path().display()),
            timing,
        }
    }

    #[tokio::test]
    async fn miss_installs_and_saves_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("yarn.lock"), "lock").unwrap();
        let store = RecordingStore::default();
        let orchestrator = CacheOrchestrator::new(&store);

        let installed = AtomicBool::new(false);
        let flag = &installed;
        let report = orchestrator
            .run(&lockfile_domain(&dir, DigestTiming::BeforeInstall), move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        assert!(installed.load(Ordering::SeqCst));
        assert!(report.restored.is_none());
        assert!(matches!(report.outcome, SaveOutcome::Saved { .. }));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn exact_hit_still_installs_and_skips_save() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("yarn.lock"), "lock").unwrap();
        let domain = lockfile_domain(&dir, DigestTiming::BeforeInstall);
        let key = domain.prefix.build(&domain.content_pattern).unwrap();
        let store = RecordingStore::with_entry(key.full());
        let orchestrator = CacheOrchestrator::new(&store);

        let installed = AtomicBool::new(false);
        let flag = &installed;
        let report = orchestrator
            .run(&domain, move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        assert!(installed.load(Ordering::SeqCst));
        assert_eq!(report.restored.as_deref(), Some(key.full()));
        assert_eq!(report.phase(), DomainPhase::Skipped);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn prefix_hit_saves_new_key() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("yarn.lock"), "lock v2").unwrap();
        let store = RecordingStore::with_entry("linux-yarn-canvas-stale");
        let orchestrator = CacheOrchestrator::new(&store);

        let report = orchestrator
            .run(&lockfile_domain(&dir, DigestTiming::BeforeInstall), || async { Ok(()) })
            .await
            .unwrap();

        assert_eq!(report.restored.as_deref(), Some("linux-yarn-canvas-stale"));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn save_conflict_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("yarn.lock"), "lock").unwrap();
        let store = RecordingStore {
            fail_save_with: Some(key_exists as fn(&str) -> SetupError),
            ..Default::default()
        };
        let orchestrator = CacheOrchestrator::new(&store);

        let report = orchestrator
            .run(&lockfile_domain(&dir, DigestTiming::BeforeInstall), || async { Ok(()) })
            .await
            .unwrap();

        assert!(matches!(report.outcome, SaveOutcome::Conflict { .. }));
        assert_eq!(report.phase(), DomainPhase::Saved);
    }

    #[tokio::test]
    async fn other_save_failure_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("yarn.lock"), "lock").unwrap();
        let store = RecordingStore {
            fail_save_with: Some(quota_exceeded as fn(&str) -> SetupError),
            ..Default::default()
        };
        let orchestrator = CacheOrchestrator::new(&store);

        let report = orchestrator
            .run(&lockfile_domain(&dir, DigestTiming::BeforeInstall), || async { Ok(()) })
            .await
            .unwrap();

        assert!(matches!(report.outcome, SaveOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn restore_failure_reads_as_miss() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("yarn.lock"), "lock").unwrap();
        let store = RecordingStore {
            fail_restore: true,
            ..Default::default()
        };
        let orchestrator = CacheOrchestrator::new(&store);

        let report = orchestrator
            .run(&lockfile_domain(&dir, DigestTiming::BeforeInstall), || async { Ok(()) })
            .await
            .unwrap();

        assert!(report.restored.is_none());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn install_failure_propagates_without_save() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("yarn.lock"), "lock").unwrap();
        let store = RecordingStore::default();
        let orchestrator = CacheOrchestrator::new(&store);

        let err = orchestrator
            .run(&lockfile_domain(&dir, DigestTiming::BeforeInstall), || async {
                Err(SetupError::CommandFailed {
                    command: "yarn install".into(),
                    code: 1,
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SetupError::CommandFailed { .. }));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn after_install_timing_recomputes_key() {
        let dir = TempDir::new().unwrap();
        let domain = CacheDomain {
            label: "libs".into(),
            prefix: KeyPrefix::new("linux", "canvas-libs", Some("ALL")),
            paths: vec![dir.path().join("libs")],
            content_pattern: format!("{}/libs/**/ETAG", dir.path().display()),
            timing: DigestTiming::AfterInstall,
        };
        let store = RecordingStore::default();
        let orchestrator = CacheOrchestrator::new(&store);

        let libs = dir.path().join("libs/skia/wasm/v1");
        let libs = &libs;
        orchestrator
            .run(&domain, move || async move {
                fs::create_dir_all(libs).unwrap();
                fs::write(libs.join("ETAG"), "\"abc\"").unwrap();
                Ok(())
            })
            .await
            .unwrap();

        let saved = store.saves.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        assert_ne!(saved[0], format!("linux-canvas-libs-ALL-{EMPTY_DIGEST}"));
        assert!(saved[0].starts_with("linux-canvas-libs-ALL-"));
    }

    #[tokio::test]
    async fn before_install_timing_keeps_pre_install_key() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("yarn.lock"), "before").unwrap();
        let domain = lockfile_domain(&dir, DigestTiming::BeforeInstall);
        let expected = domain.prefix.build(&domain.content_pattern).unwrap();
        let store = RecordingStore::default();
        let orchestrator = CacheOrchestrator::new(&store);

        let lockfile = dir.path().join("yarn.lock");
        let lockfile = &lockfile;
        orchestrator
            .run(&domain, move || async move {
                fs::write(lockfile, "rewritten by install").unwrap();
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(store.saves.lock().unwrap().as_slice(), &[expected.full().to_string()]);
    }

    #[tokio::test]
    async fn deferred_roundtrip_through_state() {
        let dir = TempDir::new().unwrap();
        let sys_cache = dir.path().join("cache");
        fs::create_dir_all(&sys_cache).unwrap();
        let prefix = KeyPrefix::new("linux", "emsdk-syscache", Some("3.1.45"));
        let pattern = format!("{}/**/*", sys_cache.display());
        let store = RecordingStore::default();
        let orchestrator = CacheOrchestrator::new(&store);

        let mut state = JobState::in_memory();
        let restored = orchestrator
            .restore_deferred("emsdk syscache", &[sys_cache.clone()], &prefix, &mut state)
            .await;
        assert!(restored.is_none());
        assert_eq!(state.get(EMSDK_SYS_CACHE_RESTORE_KEY), Some(prefix.as_str()));
        assert_eq!(state.get(EMSDK_SYS_CACHE_KEY), None);

        fs::write(sys_cache.join("libc.a"), "archive").unwrap();
        let outcome = orchestrator
            .finalize_deferred("emsdk syscache", &[sys_cache.clone()], &pattern, &state)
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Saved { .. }));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn deferred_unchanged_content_skips() {
        let dir = TempDir::new().unwrap();
        let sys_cache = dir.path().join("cache");
        fs::create_dir_all(&sys_cache).unwrap();
        fs::write(sys_cache.join("libc.a"), "archive").unwrap();
        let prefix = KeyPrefix::new("linux", "emsdk-syscache", Some("3.1.45"));
        let pattern = format!("{}/**/*", sys_cache.display());
        let existing = prefix.build(&pattern).unwrap();
        let store = RecordingStore::with_entry(existing.full());
        let orchestrator = CacheOrchestrator::new(&store);

        let mut state = JobState::in_memory();
        let restored = orchestrator
            .restore_deferred("emsdk syscache", &[sys_cache.clone()], &prefix, &mut state)
            .await;
        assert_eq!(restored.as_deref(), Some(existing.full()));

        let outcome = orchestrator
            .finalize_deferred("emsdk syscache", &[sys_cache], &pattern, &state)
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.save_attempted());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn deferred_without_state_issues_no_save() {
        let dir = TempDir::new().unwrap();
        let store = RecordingStore::default();
        let orchestrator = CacheOrchestrator::new(&store);

        let outcome = orchestrator
            .finalize_deferred(
                "emsdk syscache",
                &[dir.path().to_path_buf()],
                &format!("{}/**/*", dir.path().display()),
                &JobState::in_memory(),
            )
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert_eq!(store.save_count(), 0);
    }
}
