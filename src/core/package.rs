//! Package declarations: what a recipe registers.

use semver::Version;

use crate::core::binding::{BuildSystem, BuildSystemBinding};
use crate::core::dependency::DependencyDecl;
use crate::core::name::PackageName;
use crate::core::variant::{VariantDecl, BUILD_TYPE_VARIANT};
use crate::resolver::version::VersionConstraint;

/// A declared version. The checksum is carried for the staging collaborator
/// and never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDecl {
    pub version: Version,
    pub checksum: Option<String>,
}

impl VersionDecl {
    pub fn new(version: Version) -> Self {
        VersionDecl {
            version,
            checksum: None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }
}

/// Everything the core knows about one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDeclaration {
    name: PackageName,
    description: Option<String>,
    homepage: Option<String>,
    versions: Vec<VersionDecl>,
    variants: Vec<VariantDecl>,
    dependencies: Vec<DependencyDecl>,
    binding: BuildSystemBinding,
}

impl PackageDeclaration {
    pub fn new(name: impl Into<PackageName>, binding: BuildSystemBinding) -> Self {
        PackageDeclaration {
            name: name.into(),
            description: None,
            homepage: None,
            versions: Vec::new(),
            variants: Vec::new(),
            dependencies: Vec::new(),
            binding,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = Some(homepage.into());
        self
    }

    pub fn with_version(mut self, version: VersionDecl) -> Self {
        self.versions.push(version);
        self
    }

    pub fn with_variant(mut self, variant: VariantDecl) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn with_dependency(mut self, dependency: DependencyDecl) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn name(&self) -> PackageName {
        self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    /// Declared versions, in declaration order.
    pub fn versions(&self) -> &[VersionDecl] {
        &self.versions
    }

    pub fn variants(&self) -> &[VariantDecl] {
        &self.variants
    }

    pub fn variant(&self, name: &str) -> Option<&VariantDecl> {
        self.variants.iter().find(|v| v.name() == name)
    }

    pub fn dependencies(&self) -> &[DependencyDecl] {
        &self.dependencies
    }

    pub fn binding(&self) -> &BuildSystemBinding {
        &self.binding
    }

    /// The highest declared version satisfying `constraint`.
    ///
    /// Equal versions resolve to the one declared first.
    pub fn best_version(&self, constraint: &VersionConstraint) -> Option<&VersionDecl> {
        self.versions
            .iter()
            .filter(|v| constraint.satisfied_by(&v.version))
            .fold(None, |best: Option<&VersionDecl>, candidate| match best {
                Some(b) if b.version >= candidate.version => Some(b),
                _ => Some(candidate),
            })
    }

    /// Give CMake packages their implicit `build_type` variant, and let the
    /// binding accept exactly the build types that variant declares.
    pub(crate) fn normalize(mut self) -> Self {
        if self.binding.system() != BuildSystem::CMake {
            return self;
        }
        if self.variant(BUILD_TYPE_VARIANT).is_none() {
            self.variants.push(VariantDecl::build_type());
        }
        let legal = self
            .variant(BUILD_TYPE_VARIANT)
            .map(VariantDecl::legal_values)
            .unwrap_or_default();
        self.binding = self.binding.with_legal_build_types(legal);
        self
    }
}
