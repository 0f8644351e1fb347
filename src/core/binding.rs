//! Build-system bindings.
//!
//! A binding is the immutable, per-package answer to "how is this built":
//! which build system drives it, which phases run, which targets each phase
//! invokes, and which extra configure arguments apply under which guards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::guard::Guard;
use crate::core::variant::BuildType;

/// Default CMake generator.
pub const DEFAULT_GENERATOR: &str = "Unix Makefiles";

/// Build directory created inside the stage for out-of-source builds.
pub const BUILD_DIR_NAME: &str = "kiln-build";

/// Supported build systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    CMake,
    Autotools,
}

impl BuildSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildSystem::CMake => "cmake",
            BuildSystem::Autotools => "autotools",
        }
    }

    /// Where configure and build run, given the staged source.
    pub fn build_dir(&self, stage_dir: &Path, source_dir: &Path) -> PathBuf {
        match self {
            BuildSystem::CMake => stage_dir.join(BUILD_DIR_NAME),
            BuildSystem::Autotools => source_dir.to_path_buf(),
        }
    }
}

impl fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unknown build system name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown build system `{0}` (expected cmake or autotools)")]
pub struct UnknownBuildSystem(pub String);

impl FromStr for BuildSystem {
    type Err = UnknownBuildSystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cmake" => Ok(BuildSystem::CMake),
            "autotools" => Ok(BuildSystem::Autotools),
            other => Err(UnknownBuildSystem(other.to_string())),
        }
    }
}

/// A configure argument that only applies when its guard holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalArg {
    pub arg: String,
    pub when: Guard,
}

impl ConditionalArg {
    pub fn always(arg: impl Into<String>) -> Self {
        ConditionalArg {
            arg: arg.into(),
            when: Guard::always(),
        }
    }

    pub fn when(arg: impl Into<String>, guard: Guard) -> Self {
        ConditionalArg {
            arg: arg.into(),
            when: guard,
        }
    }
}

/// How one package is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSystemBinding {
    system: BuildSystem,
    generator: String,
    legal_generators: Vec<String>,
    legal_build_types: Vec<String>,
    build_targets: Vec<String>,
    install_targets: Vec<String>,
    test_targets: Vec<String>,
    source_subdir: Option<PathBuf>,
    extra_args: Vec<ConditionalArg>,
    sanity_paths: Vec<String>,
}

impl BuildSystemBinding {
    /// A CMake binding with the `Unix Makefiles` generator.
    pub fn cmake() -> Self {
        BuildSystemBinding {
            system: BuildSystem::CMake,
            generator: DEFAULT_GENERATOR.to_string(),
            legal_generators: vec!["Unix Makefiles".to_string(), "Ninja".to_string()],
            legal_build_types: BuildType::names(),
            build_targets: Vec::new(),
            install_targets: vec!["install".to_string()],
            test_targets: vec!["test".to_string(), "check".to_string()],
            source_subdir: None,
            extra_args: Vec::new(),
            sanity_paths: Vec::new(),
        }
    }

    /// An in-source `./configure && make` binding.
    pub fn autotools() -> Self {
        BuildSystemBinding {
            system: BuildSystem::Autotools,
            generator: String::new(),
            legal_generators: Vec::new(),
            legal_build_types: Vec::new(),
            build_targets: Vec::new(),
            install_targets: vec!["install".to_string()],
            test_targets: vec!["check".to_string()],
            source_subdir: None,
            extra_args: Vec::new(),
            sanity_paths: Vec::new(),
        }
    }

    /// The default binding for a build system.
    pub fn for_system(system: BuildSystem) -> Self {
        match system {
            BuildSystem::CMake => Self::cmake(),
            BuildSystem::Autotools => Self::autotools(),
        }
    }

    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }

    pub fn with_legal_generators<I, S>(mut self, generators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.legal_generators = generators.into_iter().map(Into::into).collect();
        self
    }

    /// Build types the configure step accepts. Normally the legal values of
    /// the package's `build_type` variant.
    pub fn with_legal_build_types<I, S>(mut self, build_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.legal_build_types = build_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_build_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_install_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.install_targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_test_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Locate the top-level build file in a subdirectory of the source.
    pub fn with_source_subdir(mut self, subdir: impl Into<PathBuf>) -> Self {
        self.source_subdir = Some(subdir.into());
        self
    }

    pub fn with_arg(mut self, arg: ConditionalArg) -> Self {
        self.extra_args.push(arg);
        self
    }

    /// Paths (globs, relative to the prefix) that must exist after install.
    pub fn with_sanity_path(mut self, path: impl Into<String>) -> Self {
        self.sanity_paths.push(path.into());
        self
    }

    pub fn system(&self) -> BuildSystem {
        self.system
    }

    pub fn generator(&self) -> &str {
        &self.generator
    }

    pub fn legal_generators(&self) -> &[String] {
        &self.legal_generators
    }

    pub fn legal_build_types(&self) -> &[String] {
        &self.legal_build_types
    }

    pub fn build_targets(&self) -> &[String] {
        &self.build_targets
    }

    pub fn install_targets(&self) -> &[String] {
        &self.install_targets
    }

    /// Test targets, run in order. Targets missing from the build tree are
    /// skipped.
    pub fn test_targets(&self) -> &[String] {
        &self.test_targets
    }

    pub fn extra_args(&self) -> &[ConditionalArg] {
        &self.extra_args
    }

    pub fn sanity_paths(&self) -> &[String] {
        &self.sanity_paths
    }

    /// Directory holding the top-level build file.
    pub fn source_root(&self, staged: &Path) -> PathBuf {
        match &self.source_subdir {
            Some(subdir) => staged.join(subdir),
            None => staged.to_path_buf(),
        }
    }

    /// Guards on extra arguments, for registration-time validation.
    pub fn guards(&self) -> impl Iterator<Item = &Guard> {
        self.extra_args.iter().map(|a| &a.when)
    }
}
