//! canvas-setup - CI job setup with content-addressed dependency caching
//!
//! Restores, installs and saves the yarn, pip, Emscripten SDK and prebuilt
//! library caches of a canvas checkout. Cache keys are derived from the
//! files that define each cache's content, so unchanged dependencies are
//! never uploaded twice.

pub mod archive;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod job;
pub mod platform;
pub mod setup;

pub use error::{SetupError, SetupResult};
