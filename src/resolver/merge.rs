//! Pure constraint merging.
//!
//! When several dependents constrain the same package, their demands are
//! merged: version ranges intersect, variant requests union (two different
//! values for one variant is a conflict), and dependency types accumulate.

use thiserror::Error;

use crate::core::dependency::{DepTypes, DependencyDecl};
use crate::core::package::PackageDeclaration;
use crate::core::spec::AbstractSpec;
use crate::core::variant::{VariantSpec, VariantValue};
use crate::resolver::version::VersionConstraint;

/// Two version constraints with no common version.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{left} and {right} have no version in common")]
pub struct Unsatisfiable {
    pub left: VersionConstraint,
    pub right: VersionConstraint,
}

/// Two different values demanded for one variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("variant `{variant}` demanded as both `{left}` and `{right}`")]
pub struct ConflictingVariant {
    pub variant: String,
    pub left: VariantValue,
    pub right: VariantValue,
}

/// Either way a merge can fail.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MergeConflict {
    #[error(transparent)]
    Versions(#[from] Unsatisfiable),

    #[error(transparent)]
    Variant(#[from] ConflictingVariant),
}

/// Intersect two version constraints.
pub fn merge_versions(
    a: &VersionConstraint,
    b: &VersionConstraint,
) -> Result<VersionConstraint, Unsatisfiable> {
    let merged = a.intersect(b);
    if merged.is_empty() {
        Err(Unsatisfiable {
            left: a.clone(),
            right: b.clone(),
        })
    } else {
        Ok(merged)
    }
}

/// Union two variant requests.
pub fn merge_variants(a: &VariantSpec, b: &VariantSpec) -> Result<VariantSpec, ConflictingVariant> {
    let mut merged = a.clone();
    for (name, value) in b.iter() {
        match a.get(name) {
            Some(existing) if existing != value => {
                return Err(ConflictingVariant {
                    variant: name.to_string(),
                    left: existing.clone(),
                    right: value.clone(),
                });
            }
            Some(_) => {}
            None => {
                merged.insert(name, value.clone());
            }
        }
    }
    Ok(merged)
}

/// Union two dependency-type sets.
pub fn merge_types(a: DepTypes, b: DepTypes) -> DepTypes {
    a | b
}

/// Whether `spec` already pins every field `decl` declares.
pub fn is_concrete(spec: &AbstractSpec, decl: &PackageDeclaration) -> bool {
    spec.is_concrete(decl)
}

/// What one dependent asks of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demand {
    pub constraint: VersionConstraint,
    pub variants: VariantSpec,
    pub types: DepTypes,
}

impl Demand {
    /// The demand a root request places on its own package.
    pub fn root(spec: &AbstractSpec) -> Self {
        Demand {
            constraint: spec.constraint.clone(),
            variants: spec.variants.clone(),
            types: DepTypes::NONE,
        }
    }

    /// The demand a dependency declaration places on its target.
    pub fn from_decl(decl: &DependencyDecl) -> Self {
        Demand {
            constraint: decl.constraint().clone(),
            variants: decl.variants().clone(),
            types: decl.types(),
        }
    }

    pub fn merge(&self, other: &Demand) -> Result<Demand, MergeConflict> {
        Ok(Demand {
            constraint: merge_versions(&self.constraint, &other.constraint)?,
            variants: merge_variants(&self.variants, &other.variants)?,
            types: merge_types(self.types, other.types),
        })
    }

    /// Render for constraint chains: `>=2.0 +shared`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.constraint.is_any() {
            parts.push(self.constraint.to_string());
        }
        if !self.variants.is_empty() {
            parts.push(self.variants.to_string());
        }
        parts.join(" ")
    }
}
