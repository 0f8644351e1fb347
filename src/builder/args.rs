//! Configure argument construction.
//!
//! Given a concrete spec and its binding, produce the exact argument vector
//! for the configure step. Dispatch is a closed match over
//! [`BuildSystem`]; both builders are pure functions of their input, so the
//! same input always yields byte-identical output.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::builder::{autotools, cmake};
use crate::core::binding::{BuildSystem, BuildSystemBinding};
use crate::core::guard::GuardContext;
use crate::core::platform::PlatformFacts;
use crate::core::spec::ConcreteSpec;
use crate::util::diagnostic::Diagnostic;

/// Everything the argument builders read.
#[derive(Debug, Clone, Copy)]
pub struct ArgInput<'a> {
    pub spec: &'a ConcreteSpec,
    pub binding: &'a BuildSystemBinding,
    /// Root of the staged source tree, before `source_subdir`.
    pub source_dir: &'a Path,
    /// Install prefix of this spec.
    pub prefix: &'a Path,
    /// Prefixes of direct build and link dependencies, in graph order.
    pub dep_prefixes: &'a [PathBuf],
    /// Prefixes of every transitive link dependency, in graph order.
    pub link_prefixes: &'a [PathBuf],
    pub platform: &'a PlatformFacts,
}

impl ArgInput<'_> {
    pub(crate) fn guard_context(&self) -> GuardContext<'_> {
        GuardContext {
            version: self.spec.version(),
            variants: self.spec.variants(),
            platform: self.platform,
        }
    }

    /// The binding's extra arguments whose guard holds, in declaration order.
    pub(crate) fn extra_args(&self) -> Vec<String> {
        let cx = self.guard_context();
        self.binding
            .extra_args()
            .iter()
            .filter(|a| a.when.evaluate(&cx))
            .map(|a| a.arg.clone())
            .collect()
    }

    /// Runtime search paths: the spec's own `lib` and `lib64`, then those of
    /// every link dependency, without duplicates.
    pub fn rpaths(&self) -> Vec<String> {
        let mut rpaths: Vec<String> = Vec::new();
        for prefix in std::iter::once(self.prefix).chain(self.link_prefixes.iter().map(PathBuf::as_path)) {
            for dir in ["lib", "lib64"] {
                let path = prefix.join(dir).display().to_string();
                if !rpaths.contains(&path) {
                    rpaths.push(path);
                }
            }
        }
        rpaths
    }
}

/// Argument construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error, miette::Diagnostic)]
pub enum ArgsError {
    #[error("invalid CMake generator `{generator}`")]
    #[diagnostic(code(kiln::args::unsupported_generator))]
    UnsupportedGenerator { generator: String, legal: Vec<String> },

    #[error("invalid build type `{value}`")]
    #[diagnostic(code(kiln::args::invalid_build_type))]
    InvalidBuildType { value: String, legal: Vec<String> },
}

impl ArgsError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ArgsError::UnsupportedGenerator { generator, legal } => {
                Diagnostic::error(format!("invalid CMake generator `{}`", generator))
                    .with_context(format!("supported primary generators: {}", legal.join(", ")))
                    .with_suggestion("set `generator` in the recipe's [build] table to a supported value")
            }
            ArgsError::InvalidBuildType { value, legal } => {
                Diagnostic::error(format!("invalid build type `{}`", value))
                    .with_suggestion(format!("use one of: {}", legal.join(", ")))
            }
        }
    }
}

/// Checks that can reject a node before anything is staged.
pub fn preflight(spec: &ConcreteSpec, binding: &BuildSystemBinding) -> Result<(), ArgsError> {
    match binding.system() {
        BuildSystem::CMake => cmake::preflight(spec, binding),
        BuildSystem::Autotools => Ok(()),
    }
}

/// The configure argument vector for `input`.
pub fn configure_args(input: &ArgInput<'_>) -> Result<Vec<String>, ArgsError> {
    match input.binding.system() {
        BuildSystem::CMake => cmake::configure_args(input),
        BuildSystem::Autotools => Ok(autotools::configure_args(input)),
    }
}
