//! Key command - print the cache key a domain would use on this runner

use crate::cache::build_key;
use crate::error::{SetupError, SetupResult};
use crate::platform::Platform;

/// Execute the key command
pub async fn execute(domain: String, pattern: String, version: Option<String>) -> SetupResult<()> {
    let platform = Platform::detect();

    let key = tokio::task::spawn_blocking(move || {
        build_key(&domain, platform.tag(), version.as_deref(), &pattern)
    })
    .await
    .map_err(|e| SetupError::Internal(format!("Hash task failed: {}", e)))??;

    println!("prefix: {}", key.prefix());
    println!("key: {}", key.full());
    Ok(())
}
