//! TOML recipe files.
//!
//! A recipe describes one package: its versions, variants, dependencies and
//! build-system binding. Recipes are parsed into [`PackageDeclaration`]s and
//! handed to the registry.
//!
//! ```toml
//! [package]
//! name = "octave"
//! build-system = "autotools"
//!
//! [[version]]
//! version = "4.4.1"
//! checksum = "09fbd0f212f4ef21e53f1d9c41cf30ce3d7f9450fb44911601e21ed64c67ae97"
//!
//! [variants]
//! readline = { default = true, description = "Use readline" }
//!
//! [[dependency]]
//! name = "readline"
//! when = "+readline"
//!
//! [[build.args]]
//! arg = "--enable-readline"
//! when = "+readline"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::binding::{BuildSystem, BuildSystemBinding, ConditionalArg};
use crate::core::dependency::{DepTypes, DependencyDecl};
use crate::core::guard::Guard;
use crate::core::name::PackageName;
use crate::core::package::{PackageDeclaration, VersionDecl};
use crate::core::variant::{BuildType, VariantDecl, VariantValue, BUILD_TYPE_VARIANT};
use crate::resolver::version::{parse_version, VersionConstraint};

/// A parsed recipe file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    pub package: RecipePackage,

    #[serde(default, rename = "version")]
    pub versions: Vec<RecipeVersion>,

    #[serde(default)]
    pub variants: BTreeMap<String, RecipeVariant>,

    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<RecipeDependency>,

    #[serde(default)]
    pub build: RecipeBuild,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RecipePackage {
    pub name: PackageName,
    pub build_system: BuildSystem,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeVersion {
    pub version: String,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeVariant {
    pub default: VariantValue,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeDependency {
    pub name: PackageName,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, rename = "type")]
    pub types: Option<DepTypes>,
    #[serde(default)]
    pub variants: BTreeMap<String, VariantValue>,
    #[serde(default)]
    pub when: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RecipeBuild {
    pub generator: Option<String>,
    pub legal_generators: Option<Vec<String>>,
    pub build_targets: Option<Vec<String>>,
    pub install_targets: Option<Vec<String>>,
    pub test_targets: Option<Vec<String>>,
    pub source_subdir: Option<PathBuf>,
    #[serde(default)]
    pub sanity_check: Vec<String>,
    #[serde(default)]
    pub args: Vec<RecipeArg>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeArg {
    pub arg: String,
    #[serde(default)]
    pub when: Option<String>,
}

impl Recipe {
    /// Load a recipe from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read recipe: {}", path.display()))?;
        contents
            .parse()
            .with_context(|| format!("failed to parse recipe: {}", path.display()))
    }

    /// Convert into a declaration. Semantic validation happens at registration.
    pub fn into_declaration(self) -> Result<PackageDeclaration> {
        let name = self.package.name;
        let binding = self.build.into_binding(self.package.build_system)?;

        let mut decl = PackageDeclaration::new(name, binding);
        if let Some(description) = self.package.description {
            decl = decl.with_description(description);
        }
        if let Some(homepage) = self.package.homepage {
            decl = decl.with_homepage(homepage);
        }

        for v in self.versions {
            let version = parse_version(&v.version)
                .with_context(|| format!("in versions of `{}`", name))?;
            let mut version = VersionDecl::new(version);
            if let Some(checksum) = v.checksum {
                version = version.with_checksum(checksum);
            }
            decl = decl.with_version(version);
        }

        for (variant_name, v) in self.variants {
            decl = decl.with_variant(
                v.into_decl(&variant_name)
                    .with_context(|| format!("in variant `{}` of `{}`", variant_name, name))?,
            );
        }

        for d in self.dependencies {
            let target = d.name;
            decl = decl.with_dependency(
                d.into_decl()
                    .with_context(|| format!("in dependency `{}` of `{}`", target, name))?,
            );
        }

        Ok(decl)
    }
}

impl FromStr for Recipe {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl RecipeVariant {
    fn into_decl(self, name: &str) -> Result<VariantDecl> {
        let decl = match (&self.default, name) {
            (VariantValue::Bool(default), _) => {
                anyhow::ensure!(
                    self.values.is_empty(),
                    "boolean variants cannot list values"
                );
                VariantDecl::boolean(name, *default)
            }
            (VariantValue::Choice(default), BUILD_TYPE_VARIANT) if self.values.is_empty() => {
                VariantDecl::build_type_with(default.clone(), BuildType::names())?
            }
            (VariantValue::Choice(default), BUILD_TYPE_VARIANT) => {
                VariantDecl::build_type_with(default.clone(), self.values)?
            }
            (VariantValue::Choice(default), _) => {
                VariantDecl::choice(name, default.clone(), self.values)?
            }
        };
        Ok(match self.description {
            Some(description) => decl.with_description(description),
            None => decl,
        })
    }
}

impl RecipeDependency {
    fn into_decl(self) -> Result<DependencyDecl> {
        let mut decl = DependencyDecl::new(self.name);
        if let Some(version) = self.version {
            decl = decl.with_constraint(VersionConstraint::parse(&version)?);
        }
        if let Some(types) = self.types {
            anyhow::ensure!(!types.is_empty(), "dependency type list is empty");
            decl = decl.with_types(types);
        }
        for (variant, value) in self.variants {
            decl = decl.with_variant(variant, value);
        }
        if let Some(when) = self.when {
            decl = decl.when(Guard::parse(&when)?);
        }
        Ok(decl)
    }
}

impl RecipeBuild {
    fn into_binding(self, system: BuildSystem) -> Result<BuildSystemBinding> {
        let mut binding = BuildSystemBinding::for_system(system);
        if let Some(generator) = self.generator {
            binding = binding.with_generator(generator);
        }
        if let Some(generators) = self.legal_generators {
            binding = binding.with_legal_generators(generators);
        }
        if let Some(targets) = self.build_targets {
            binding = binding.with_build_targets(targets);
        }
        if let Some(targets) = self.install_targets {
            binding = binding.with_install_targets(targets);
        }
        if let Some(targets) = self.test_targets {
            binding = binding.with_test_targets(targets);
        }
        if let Some(subdir) = self.source_subdir {
            binding = binding.with_source_subdir(subdir);
        }
        for path in self.sanity_check {
            binding = binding.with_sanity_path(path);
        }
        for arg in self.args {
            let guard = match arg.when {
                Some(when) => Guard::parse(&when)?,
                None => Guard::always(),
            };
            binding = binding.with_arg(ConditionalArg::when(arg.arg, guard));
        }
        Ok(binding)
    }
}
