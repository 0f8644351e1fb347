//! Directory layout for staging and installation.

use std::path::{Path, PathBuf};

use crate::core::spec::ConcreteSpec;

/// Where specs are staged and installed.
///
/// Every spec owns one stage directory and one install prefix, both named
/// `<name>-<version>-<hash7>` so that distinct configurations never share a
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    stage_root: PathBuf,
    install_root: PathBuf,
}

impl Layout {
    pub fn new(stage_root: impl Into<PathBuf>, install_root: impl Into<PathBuf>) -> Self {
        Layout {
            stage_root: stage_root.into(),
            install_root: install_root.into(),
        }
    }

    /// Stage under `<root>/stage`, install under `<root>/install`.
    pub fn under(root: &Path) -> Self {
        Layout::new(root.join("stage"), root.join("install"))
    }

    pub fn stage_root(&self) -> &Path {
        &self.stage_root
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn dir_name(spec: &ConcreteSpec) -> String {
        format!("{}-{}-{}", spec.name(), spec.version(), spec.hash().short())
    }

    pub fn stage_dir(&self, spec: &ConcreteSpec) -> PathBuf {
        self.stage_root.join(Self::dir_name(spec))
    }

    pub fn prefix(&self, spec: &ConcreteSpec) -> PathBuf {
        self.install_root.join(Self::dir_name(spec))
    }
}
