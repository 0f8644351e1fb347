//! The package registry.
//!
//! Registration and lookup are split across two types. A [`RegistryBuilder`]
//! accepts declarations at startup; [`RegistryBuilder::freeze`] consumes it
//! and yields a [`Registry`], a cheap-to-clone, read-only snapshot that any
//! number of solver threads may query at once. Nothing can be registered
//! once solving has started because the builder no longer exists.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::binding::BuildSystem;
use crate::core::dependency::{DepTypes, DependencyDecl};
use crate::core::name::PackageName;
use crate::core::package::PackageDeclaration;
use crate::core::recipe::Recipe;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Registry errors.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum RegistryError {
    #[error("package `{0}` is already registered")]
    #[diagnostic(code(kiln::registry::duplicate))]
    Duplicate(PackageName),

    #[error("package `{name}` is not registered")]
    #[diagnostic(code(kiln::registry::not_found))]
    NotFound {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("invalid declaration for `{package}`: {reason}")]
    #[diagnostic(code(kiln::registry::invalid))]
    Invalid { package: PackageName, reason: String },

    #[error("failed to load recipe")]
    #[diagnostic(code(kiln::registry::recipe))]
    Recipe(#[source] anyhow::Error),
}

impl RegistryError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            RegistryError::NotFound { name, suggestions: similar } => {
                let mut diag = Diagnostic::error(format!("package `{}` is not registered", name));
                if !similar.is_empty() {
                    diag = diag.with_context(format!("similar names: {}", similar.join(", ")));
                }
                diag.with_suggestion(suggestions::UNKNOWN_PACKAGE)
            }
            RegistryError::Recipe(err) => Diagnostic::error(format!("{:#}", err)),
            other => Diagnostic::error(other.to_string()),
        }
    }
}

/// Package that CMake packages build-depend on when
/// [`RegistryBuilder::with_implicit_cmake`] is set.
pub const CMAKE_PACKAGE: &str = "cmake";

/// Mutable registration phase.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    packages: BTreeMap<PackageName, PackageDeclaration>,
    implicit_cmake: bool,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    /// Register one package.
    ///
    /// The declaration is validated: at least one version, guards that only
    /// read variants the package declares, no duplicate variant names, and a
    /// unique package name. CMake packages gain an implicit `build_type`.
    pub fn register(&mut self, decl: PackageDeclaration) -> Result<(), RegistryError> {
        let decl = decl.normalize();
        let name = decl.name();
        validate(&decl)?;

        if self.packages.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(package = %name, versions = decl.versions().len(), "registered package");
        self.packages.insert(name, decl);
        Ok(())
    }

    /// Builder-style registration for fixtures and tests.
    pub fn with(mut self, decl: PackageDeclaration) -> Result<Self, RegistryError> {
        self.register(decl)?;
        Ok(self)
    }

    /// Give every CMake package a build dependency on `cmake` at freeze
    /// time, provided a `cmake` recipe is registered.
    pub fn with_implicit_cmake(mut self) -> Self {
        self.implicit_cmake = true;
        self
    }

    /// Register every `*.toml` recipe under `dir`, in path order.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, RegistryError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry
                .with_context(|| format!("failed to walk recipe directory {}", dir.display()))
                .map_err(RegistryError::Recipe)?;
            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "toml")
            {
                paths.push(entry.into_path());
            }
        }

        for path in &paths {
            let decl = Recipe::load(path)
                .and_then(Recipe::into_declaration)
                .map_err(RegistryError::Recipe)?;
            self.register(decl)?;
        }
        tracing::info!(dir = %dir.display(), count = paths.len(), "loaded recipes");
        Ok(paths.len())
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// End registration.
    pub fn freeze(self) -> Registry {
        let mut packages = self.packages;
        if self.implicit_cmake && packages.contains_key(CMAKE_PACKAGE) {
            packages = packages
                .into_iter()
                .map(|(name, decl)| (name, with_cmake_dependency(decl)))
                .collect();
        }
        Registry {
            packages: Arc::new(packages),
        }
    }
}

fn with_cmake_dependency(decl: PackageDeclaration) -> PackageDeclaration {
    let applies = decl.binding().system() == BuildSystem::CMake
        && decl.name() != CMAKE_PACKAGE
        && !decl.dependencies().iter().any(|d| d.name() == CMAKE_PACKAGE);
    if !applies {
        return decl;
    }
    tracing::trace!(package = %decl.name(), "adding implicit cmake build dependency");
    decl.with_dependency(DependencyDecl::new(CMAKE_PACKAGE).with_types(DepTypes::BUILD))
}

fn validate(decl: &PackageDeclaration) -> Result<(), RegistryError> {
    let invalid = |reason: String| RegistryError::Invalid {
        package: decl.name(),
        reason,
    };

    if decl.versions().is_empty() {
        return Err(invalid("no versions declared".to_string()));
    }

    let mut seen = std::collections::HashSet::new();
    for variant in decl.variants() {
        if !seen.insert(variant.name()) {
            return Err(invalid(format!("variant `{}` declared twice", variant.name())));
        }
    }

    let guards = decl
        .dependencies()
        .iter()
        .map(|d| d.guard())
        .chain(decl.binding().guards());
    for guard in guards {
        if let Some(unknown) = guard.variant_names().find(|n| decl.variant(n).is_none()) {
            return Err(invalid(format!(
                "guard `{}` reads undeclared variant `{}`",
                guard, unknown
            )));
        }
    }

    if let Some(dep) = decl.dependencies().iter().find(|d| d.types().is_empty()) {
        return Err(invalid(format!("dependency on `{}` has no type", dep.name())));
    }

    Ok(())
}

/// Frozen, shareable registry snapshot.
#[derive(Debug, Clone)]
pub struct Registry {
    packages: Arc<BTreeMap<PackageName, PackageDeclaration>>,
}

impl Registry {
    /// Look up a package by name.
    pub fn lookup(&self, name: &str) -> Result<&PackageDeclaration, RegistryError> {
        self.packages
            .get(name)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
                suggestions: self.similar_names(name),
            })
    }

    pub fn get(&self, name: &str) -> Option<&PackageDeclaration> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = PackageName> + '_ {
        self.packages.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Registered names that look like `name`.
    fn similar_names(&self, name: &str) -> Vec<String> {
        self.packages
            .keys()
            .filter(|candidate| {
                candidate.contains(name)
                    || name.contains(candidate.as_str())
                    || edit_distance(candidate, name) <= 2
            })
            .map(|c| c.to_string())
            .collect()
    }
}

/// Levenshtein distance, for "did you mean" suggestions.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut cur = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        prev = cur;
    }
    prev[b.len()]
}
