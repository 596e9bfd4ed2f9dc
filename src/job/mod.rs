//! Job-scoped state and outputs

pub mod output;
pub mod state;

pub use output::{OutputWriter, EMSDK_PATH_OUTPUT};
pub use state::{JobState, EMSDK_SYS_CACHE_KEY, EMSDK_SYS_CACHE_RESTORE_KEY};
