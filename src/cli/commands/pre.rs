//! Pre command - restore caches, install dependencies, save caches

use crate::cache::{CacheStore, LocalCacheStore, SaveOutcome};
use crate::cli::args::JobArgs;
use crate::cli::commands::job_context;
use crate::config::Config;
use crate::error::SetupResult;
use crate::exec::ProcessRunner;
use crate::job::{JobState, OutputWriter, EMSDK_SYS_CACHE_KEY, EMSDK_SYS_CACHE_RESTORE_KEY};
use crate::setup::{PreReport, Sequencer};
use console::style;
use tracing::{debug, info};

/// Execute the pre command
pub async fn execute(args: JobArgs, config: &Config) -> SetupResult<()> {
    let ctx = job_context(&args, config)?;
    info!(
        "Setting up {} on {} (arch {})",
        ctx.layout.canvas_path.display(),
        ctx.platform,
        ctx.inputs.arch
    );
    debug!("Workspace root {}", ctx.layout.workspace_root.display());

    let store = LocalCacheStore::new(config.store_dir()?);
    debug!("Using {} cache store at {}", store.store_name(), store.root().display());
    let runner = ProcessRunner::new();
    let outputs = OutputWriter::new(config.output_file());

    // A state file left over from an earlier job must not leak into this one
    let mut state = JobState::load_or_reset(config.state_file()).await;
    state.clear(EMSDK_SYS_CACHE_RESTORE_KEY);
    state.clear(EMSDK_SYS_CACHE_KEY);

    let sequencer = Sequencer::new(ctx, &runner, &store, &outputs);
    let result = sequencer.run_pre(&mut state).await;
    state.persist().await?;
    if let Some(path) = state.path() {
        debug!("Job state written to {}", path.display());
    }

    print_report(&result?);
    Ok(())
}

fn print_report(report: &PreReport) {
    for domain in &report.domains {
        let (mark, detail) = match &domain.outcome {
            SaveOutcome::Saved { key, .. } => (style("✓").green(), format!("saved {}", key)),
            SaveOutcome::Skipped { key } => (style("=").cyan(), format!("up to date {}", key)),
            SaveOutcome::Conflict { key } => {
                (style("~").yellow(), format!("saved by another job {}", key))
            }
            SaveOutcome::Failed { reason, .. } => {
                (style("!").yellow(), format!("save failed: {}", reason))
            }
        };
        let restored = match domain.restored {
            Some(ref key) => format!("restored from {}", key),
            None => "no cache restored".to_string(),
        };
        println!(
            "{} {} {}, {}",
            mark,
            style(&domain.label).bold(),
            restored,
            detail
        );
    }

    if let Some(ref key) = report.emsdk_restored {
        println!("{} emsdk syscache restored from {}", style("✓").green(), key);
    }

    let steps: Vec<&str> = report.steps.iter().map(|s| s.name()).collect();
    println!("Completed steps: {}", steps.join(", "));
}
