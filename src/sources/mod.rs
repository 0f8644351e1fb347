//! Package sources.
//!
//! A [`Stager`] places a concrete spec's source tree into its stage
//! directory before anything is configured. The orchestrator calls stagers
//! from worker threads, one node at a time per stage directory.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::spec::ConcreteSpec;

pub mod archive;
pub mod path;

pub use archive::ArchiveStager;
pub use path::DirectoryStager;

/// Directory under the stage directory that receives the source tree.
pub const SOURCE_DIR_NAME: &str = "source";

/// Fetches and unpacks sources.
pub trait Stager: Send + Sync {
    /// Populate `stage_dir` with the source of `spec` and return the root of
    /// the source tree.
    fn stage(&self, spec: &ConcreteSpec, stage_dir: &Path) -> Result<PathBuf>;
}
