//! Pre- and post-phase sequencing
//!
//! The pre phase walks `PRE_SEQUENCE` and stops at the first failing step.
//! The post phase finalizes the SDK system cache and never fails.

use crate::archive;
use crate::cache::{
    CacheDomain, CacheOrchestrator, CacheStore, DigestTiming, DomainReport, KeyPrefix, SaveOutcome,
};
use crate::config::schema::ToolchainConfig;
use crate::error::{SetupError, SetupResult};
use crate::exec::{CommandRunner, CommandSpec};
use crate::job::{JobState, OutputWriter, EMSDK_PATH_OUTPUT};
use crate::platform::Platform;
use crate::setup::layout::{Layout, SetupInputs};
use crate::setup::steps::{SetupStep, PRE_SEQUENCE};
use tracing::{debug, info, warn};

/// Everything a setup run needs to know about its environment
#[derive(Debug, Clone)]
pub struct SetupContext {
    /// Runner platform, first segment of every key
    pub platform: Platform,
    /// User inputs
    pub inputs: SetupInputs,
    /// Resolved directories
    pub layout: Layout,
    /// Compiler alternative settings
    pub toolchain: ToolchainConfig,
    /// emsdk archive to bootstrap from
    pub emsdk_archive_url: String,
}

/// What the pre phase did
#[derive(Debug, Clone, Default)]
pub struct PreReport {
    /// Steps that ran, in order
    pub steps: Vec<SetupStep>,
    /// Cache domains that completed their lifecycle in this phase
    pub domains: Vec<DomainReport>,
    /// Key the SDK system cache was restored from
    pub emsdk_restored: Option<String>,
}

/// Runs setup steps against a command runner and a cache store
pub struct Sequencer<'a> {
    ctx: SetupContext,
    runner: &'a dyn CommandRunner,
    store: &'a dyn CacheStore,
    outputs: &'a OutputWriter,
}

impl<'a> Sequencer<'a> {
    /// Create a sequencer
    pub fn new(
        ctx: SetupContext,
        runner: &'a dyn CommandRunner,
        store: &'a dyn CacheStore,
        outputs: &'a OutputWriter,
    ) -> Self {
        Self {
            ctx,
            runner,
            store,
            outputs,
        }
    }

    fn orchestrator(&self) -> CacheOrchestrator<'a> {
        CacheOrchestrator::new(self.store)
    }

    fn prefix(&self, domain: &str, version: Option<&str>) -> KeyPrefix {
        KeyPrefix::new(self.ctx.platform.tag(), domain, version)
    }

    /// Run the pre phase. Cross-phase values are written into `state`.
    pub async fn run_pre(&self, state: &mut JobState) -> SetupResult<PreReport> {
        let mut report = PreReport::default();

        for step in PRE_SEQUENCE {
            match step {
                SetupStep::YarnCache => report.domains.push(self.setup_yarn().await?),
                SetupStep::CompilerAlternative => {
                    if !self.setup_compiler_alternative().await? {
                        continue;
                    }
                }
                SetupStep::PipCache => report.domains.push(self.setup_pip().await?),
                SetupStep::EmsdkSysCache => match self.ctx.inputs.emsdk_version.clone() {
                    Some(version) => {
                        report.emsdk_restored = self.setup_emsdk(&version, state).await?;
                    }
                    None => {
                        debug!("No emsdk version configured, skipping SDK setup");
                        continue;
                    }
                },
                SetupStep::LibsCache => report.domains.push(self.setup_libs().await?),
            }
            report.steps.push(step);
        }

        Ok(report)
    }

    /// Run the post phase. Errors are logged, never returned.
    pub async fn run_post(&self, state: &JobState) -> Option<SaveOutcome> {
        if self.ctx.inputs.emsdk_version.is_none() {
            debug!("No emsdk version configured, nothing to save");
            return None;
        }
        match self.save_emsdk_sys_cache(state).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    async fn save_emsdk_sys_cache(&self, state: &JobState) -> SetupResult<Option<SaveOutcome>> {
        let layout = &self.ctx.layout;
        self.orchestrator()
            .finalize_deferred(
                "emsdk syscache",
                &[layout.emsdk_sys_cache()],
                &layout.emsdk_sys_cache_pattern(),
                state,
            )
            .await
    }

    async fn setup_yarn(&self) -> SetupResult<DomainReport> {
        let layout = &self.ctx.layout;

        let query = CommandSpec::new("yarn", ["cache", "dir"])
            .current_dir(&layout.canvas_path)
            .captured();
        let output = self.runner.execute(&query).await?;
        if !output.stderr.trim().is_empty() {
            return Err(SetupError::CommandStderr {
                command: query.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        let cache_dir = output.stdout.trim();
        if cache_dir.is_empty() {
            return Err(SetupError::Internal("yarn reported an empty cache dir".into()));
        }

        let domain = CacheDomain {
            label: "yarn".into(),
            prefix: self.prefix("yarn-canvas", None),
            paths: vec![cache_dir.into()],
            content_pattern: layout.canvas_path.join("yarn.lock").display().to_string(),
            timing: DigestTiming::BeforeInstall,
        };

        let install = CommandSpec::new("yarn", ["install"]).current_dir(&layout.canvas_path);
        self.run_domain(&domain, install).await
    }

    /// Returns whether the step ran
    async fn setup_compiler_alternative(&self) -> SetupResult<bool> {
        let toolchain = &self.ctx.toolchain;
        if !toolchain.enabled {
            debug!("Compiler alternative disabled");
            return Ok(false);
        }
        if !self.ctx.platform.supports_alternatives() {
            info!("Skipping compiler alternative on {}", self.ctx.platform);
            return Ok(false);
        }

        let compiler = toolchain.compiler.display().to_string();
        let priority = toolchain.priority.to_string();
        let commands = [
            vec![
                "--install",
                "/usr/bin/c++",
                "c++",
                compiler.as_str(),
                priority.as_str(),
            ],
            vec!["--set", "c++", compiler.as_str()],
        ];

        for args in commands {
            let spec = if toolchain.sudo {
                CommandSpec::new(
                    "sudo",
                    std::iter::once("update-alternatives").chain(args),
                )
            } else {
                CommandSpec::new("update-alternatives", args)
            };
            self.runner.execute(&spec).await?;
        }

        info!("Registered {} as c++", compiler);
        Ok(true)
    }

    async fn setup_pip(&self) -> SetupResult<DomainReport> {
        let layout = &self.ctx.layout;

        let domain = CacheDomain {
            label: "pip".into(),
            prefix: self.prefix("pip-canvas", None),
            paths: vec![layout.pip_cache_dir()],
            content_pattern: layout
                .canvas_path
                .join("requirements.txt")
                .display()
                .to_string(),
            timing: DigestTiming::BeforeInstall,
        };

        let install = CommandSpec::new("pip", ["install", "-r", "requirements.txt"])
            .current_dir(&layout.canvas_path);
        self.run_domain(&domain, install).await
    }

    async fn setup_emsdk(&self, version: &str, state: &mut JobState) -> SetupResult<Option<String>> {
        let layout = &self.ctx.layout;
        let emsdk_home = layout.emsdk_home();

        self.outputs
            .set(EMSDK_PATH_OUTPUT, &emsdk_home.display().to_string())
            .await?;

        let emsdk = emsdk_home.join("emsdk");
        if !emsdk.exists() {
            info!("emsdk not found at {}, bootstrapping", emsdk_home.display());
            let archive_path =
                archive::download(&self.ctx.emsdk_archive_url, &layout.download_dir()).await?;
            archive::extract_archive(&archive_path, &layout.home).await?;
        }

        let emsdk = emsdk.display().to_string();
        for action in ["install", "activate"] {
            let spec = CommandSpec::new(emsdk.clone(), [action, version]).current_dir(&emsdk_home);
            self.runner.execute(&spec).await?;
        }

        let restored = self
            .orchestrator()
            .restore_deferred(
                "emsdk syscache",
                &[layout.emsdk_sys_cache()],
                &self.prefix("emsdk-syscache", Some(version)),
                state,
            )
            .await;
        Ok(restored)
    }

    async fn setup_libs(&self) -> SetupResult<DomainReport> {
        let layout = &self.ctx.layout;
        let arch = self.ctx.inputs.arch.as_str();
        if self.ctx.inputs.all_arches() {
            info!("Syncing prebuilt libraries for every architecture");
        }

        let domain = CacheDomain {
            label: "libs".into(),
            prefix: self.prefix("canvas-libs", Some(arch)),
            paths: vec![layout.libs_dir()],
            content_pattern: layout.libs_content_pattern(arch),
            timing: DigestTiming::AfterInstall,
        };

        let sync = CommandSpec::new(
            layout.canvas_path.join("sync-libs").display().to_string(),
            ["--arch", arch, "--purge"],
        )
        .current_dir(&layout.canvas_path);
        self.run_domain(&domain, sync).await
    }

    async fn run_domain(&self, domain: &CacheDomain, install: CommandSpec) -> SetupResult<DomainReport> {
        let runner = self.runner;
        self.orchestrator()
            .run(domain, move || async move { runner.execute(&install).await.map(|_| ()) })
            .await
    }
}
