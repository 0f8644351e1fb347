//! Core data structures for kiln.
//!
//! This module contains the foundational types used throughout kiln:
//! - Interned package names
//! - Variants, guards and dependency declarations
//! - Build-system bindings and package declarations
//! - Abstract and concrete specs
//! - Recipes and the frozen registry

pub mod binding;
pub mod dependency;
pub mod guard;
pub mod name;
pub mod package;
pub mod platform;
pub mod recipe;
pub mod registry;
pub mod spec;
pub mod variant;

pub use binding::{BuildSystem, BuildSystemBinding, ConditionalArg};
pub use dependency::{DepType, DepTypes, DependencyDecl};
pub use guard::{Guard, GuardContext};
pub use name::PackageName;
pub use package::{PackageDeclaration, VersionDecl};
pub use platform::{OsFamily, PlatformFacts};
pub use recipe::Recipe;
pub use registry::{Registry, RegistryBuilder, RegistryError};
pub use spec::{AbstractSpec, CompilerFlags, CompilerSpec, ConcreteSpec, SpecHash};
pub use variant::{BuildType, VariantDecl, VariantSpec, VariantValue};
