//! Content-addressed dependency caching
//!
//! Cache keys are derived from the files that define a cache's content
//! (lockfiles, library ETAGs, the SDK's built system libraries):
//!
//! ```text
//! {platform}-{domain}[-{version}]-{sha256 of content}
//! \____________ restore prefix ____________/
//! ```
//!
//! # Save decision
//!
//! | Restored key | Key after install | Action |
//! |--------------|-------------------|--------|
//! | none | K | save K |
//! | prefix match K' | K | save K |
//! | K | K | skip |

pub mod hasher;
pub mod key;
pub mod orchestrator;
pub mod store;

pub use hasher::{hash_files, resolve_files, EMPTY_DIGEST};
pub use key::{build_key, CacheKey, KeyPrefix};
pub use orchestrator::{
    CacheDomain, CacheOrchestrator, DigestTiming, DomainPhase, DomainReport, SaveOutcome,
};
pub use store::{CacheStore, EntryMeta, LocalCacheStore};
