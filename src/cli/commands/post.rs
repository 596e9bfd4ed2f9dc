//! Post command - save the SDK system cache populated by the job

use crate::cache::{LocalCacheStore, SaveOutcome};
use crate::cli::args::JobArgs;
use crate::cli::commands::job_context;
use crate::config::Config;
use crate::error::SetupResult;
use crate::exec::ProcessRunner;
use crate::job::{JobState, OutputWriter};
use crate::setup::Sequencer;
use console::style;

/// Execute the post command.
///
/// Only setup problems (config, state file) are returned; saving itself
/// never fails the job.
pub async fn execute(args: JobArgs, config: &Config) -> SetupResult<()> {
    let ctx = job_context(&args, config)?;
    let store = LocalCacheStore::new(config.store_dir()?);
    let runner = ProcessRunner::new();
    let outputs = OutputWriter::new(config.output_file());

    let state = JobState::load_or_reset(config.state_file()).await;

    let sequencer = Sequencer::new(ctx, &runner, &store, &outputs);
    match sequencer.run_post(&state).await {
        Some(SaveOutcome::Saved { key, .. }) => {
            println!("{} emsdk syscache saved as {}", style("✓").green(), key)
        }
        Some(SaveOutcome::Skipped { key }) => {
            println!("{} emsdk syscache up to date ({})", style("=").cyan(), key)
        }
        Some(SaveOutcome::Conflict { key }) => println!(
            "{} emsdk syscache {} was saved by another job",
            style("~").yellow(),
            key
        ),
        Some(SaveOutcome::Failed { reason, .. }) => {
            println!("{} emsdk syscache not saved: {}", style("!").yellow(), reason)
        }
        None => {}
    }

    Ok(())
}
