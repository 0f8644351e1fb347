//! kiln - a variant-aware concretizer and build orchestrator for source packages
//!
//! This crate loads TOML package recipes into a registry, concretizes an
//! abstract request into a fully-resolved spec graph, and drives every node
//! of that graph through stage, configure, build, test, install and verify.

pub mod builder;
pub mod core;
pub mod resolver;
pub mod sources;
pub mod util;

/// Test utilities and mocks for kiln unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a recording executor, a fixture stager and
/// fixture registries.
#[cfg(test)]
pub mod test_support;

pub use core::{
    AbstractSpec, BuildSystem, BuildSystemBinding, CompilerFlags, CompilerSpec, ConcreteSpec,
    DepType, DepTypes, PackageDeclaration, PackageName, PlatformFacts, Recipe, Registry,
    RegistryBuilder, VariantSpec,
};

pub use builder::{BuildOptions, BuildReport, CancelToken, Layout, NodeState, Orchestrator};
pub use resolver::{concretize, SolveError, Solver, SpecGraph, SpecLock};
pub use sources::{ArchiveStager, DirectoryStager, Stager};
pub use util::context::GlobalContext;
