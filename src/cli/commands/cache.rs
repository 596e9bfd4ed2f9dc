//! Cache command - inspect the local cache store

use crate::cache::{EntryMeta, LocalCacheStore};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{SetupError, SetupResult};

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> SetupResult<()> {
    let store = LocalCacheStore::new(config.store_dir()?);

    match args.action {
        CacheAction::List { format } => list_entries(store, format).await,
    }
}

/// List all saved entries, newest first
async fn list_entries(store: LocalCacheStore, format: OutputFormat) -> SetupResult<()> {
    let mut entries = tokio::task::spawn_blocking(move || store.list())
        .await
        .map_err(|e| SetupError::Internal(format!("Listing task failed: {}", e)))??;
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if entries.is_empty() && !matches!(format, OutputFormat::Json) {
        println!("No cache entries found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_entry_table(&entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => print_entry_plain(&entries),
    }

    Ok(())
}

fn print_entry_table(entries: &[EntryMeta]) {
    println!("{:<90} {:>10} {:<20}", "KEY", "SIZE", "CREATED");
    println!("{}", "-".repeat(122));

    for entry in entries {
        println!(
            "{:<90} {:>10} {:<20}",
            entry.key,
            format_size(entry.size_bytes),
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("Total: {} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
}

fn print_entry_plain(entries: &[EntryMeta]) {
    for entry in entries {
        println!("{}", entry.key);
    }
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    match bytes {
        b if b >= GIB => format!("{:.1} GiB", b as f64 / GIB as f64),
        b if b >= MIB => format!("{:.1} MiB", b as f64 / MIB as f64),
        b if b >= KIB => format!("{:.1} KiB", b as f64 / KIB as f64),
        b => format!("{} B", b),
    }
}
