//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// canvas-setup - CI job setup with content-addressed dependency caching
///
/// Restores, installs and saves the yarn, pip, Emscripten SDK and prebuilt
/// library caches of a canvas checkout.
#[derive(Parser, Debug)]
#[command(name = "canvas-setup")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CANVAS_SETUP_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pre phase: restore caches, install, save
    Pre(JobArgs),

    /// Run the post phase: save the SDK system cache built by the job
    Post(JobArgs),

    /// Print the content digest of the files matching a glob pattern
    Hash {
        /// Glob pattern
        pattern: String,
    },

    /// Print the restore prefix and full cache key for this platform
    #[command(disable_version_flag = true)]
    Key {
        /// Cache domain name (e.g. yarn-canvas)
        domain: String,

        /// Glob pattern selecting the content files
        pattern: String,

        /// Version segment (SDK version, architecture)
        #[arg(long)]
        version: Option<String>,
    },

    /// Inspect the local cache store
    Cache(CacheArgs),
}

/// Job inputs shared by the pre and post phases
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Project directory relative to the workspace root
    #[arg(long, env = "INPUT_CANVAS-HOME", default_value = ".")]
    pub canvas_home: PathBuf,

    /// Prebuilt library architecture, or ALL
    #[arg(long, env = "INPUT_ARCH", default_value = "ALL")]
    pub arch: String,

    /// Emscripten SDK version; the SDK steps are skipped without it
    #[arg(long, env = "INPUT_EMSDK-VERSION")]
    pub emsdk_version: Option<String>,
}

/// Output format for list command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List saved cache entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}
