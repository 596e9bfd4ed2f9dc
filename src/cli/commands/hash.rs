//! Hash command - print the content digest of a file set

use crate::cache::hash_files;
use crate::error::{SetupError, SetupResult};

/// Execute the hash command
pub async fn execute(pattern: String) -> SetupResult<()> {
    let digest = tokio::task::spawn_blocking(move || hash_files(&pattern))
        .await
        .map_err(|e| SetupError::Internal(format!("Hash task failed: {}", e)))??;

    println!("{}", digest);
    Ok(())
}
