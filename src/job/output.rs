//! Step outputs for downstream steps
//!
//! Outputs are appended as `name=value` lines to the runner's output file
//! (`GITHUB_OUTPUT`). Without one they are printed to stdout.

use crate::error::{SetupError, SetupResult};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Output naming the installed SDK directory
pub const EMSDK_PATH_OUTPUT: &str = "emsdk-path";

/// Writes step outputs
#[derive(Debug, Clone, Default)]
pub struct OutputWriter {
    file: Option<PathBuf>,
}

impl OutputWriter {
    /// Write outputs to `file`, or stdout when `None`
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }

    /// Set an output value
    pub async fn set(&self, name: &str, value: &str) -> SetupResult<()> {
        info!("Setting output {}={}", name, value);

        let Some(ref path) = self.file else {
            println!("{}={}", name, value);
            return Ok(());
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| SetupError::io(format!("opening output file {}", path.display()), e))?;

        file.write_all(format!("{}={}\n", name, value).as_bytes())
            .await
            .map_err(|e| SetupError::io("writing step output", e))?;
        file.flush()
            .await
            .map_err(|e| SetupError::io("flushing step output", e))?;
        Ok(())
    }
}
