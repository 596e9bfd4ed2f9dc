//! CLI command implementations

pub mod cache;
pub mod hash;
pub mod key;
pub mod post;
pub mod pre;

pub use cache::execute as cache;
pub use hash::execute as hash;
pub use key::execute as key;
pub use post::execute as post;
pub use pre::execute as pre;

use crate::cli::args::JobArgs;
use crate::config::Config;
use crate::error::SetupResult;
use crate::platform::Platform;
use crate::setup::{Layout, SetupContext, SetupInputs};

/// Resolve job inputs and directories into a setup context
pub(crate) fn job_context(args: &JobArgs, config: &Config) -> SetupResult<SetupContext> {
    let inputs = SetupInputs {
        canvas_home: args.canvas_home.clone(),
        arch: args.arch.clone(),
        emsdk_version: args.emsdk_version.clone().filter(|v| !v.trim().is_empty()),
    };
    let layout = Layout::new(config.workspace_root()?, config.home_dir()?, &inputs.canvas_home);

    Ok(SetupContext {
        platform: Platform::detect(),
        inputs,
        layout,
        toolchain: config.toolchain.clone(),
        emsdk_archive_url: config.emsdk.archive_url.clone(),
    })
}
