//! Dependency declarations and dependency-type sets.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::core::guard::Guard;
use crate::core::name::PackageName;
use crate::core::variant::{VariantSpec, VariantValue};
use crate::resolver::version::VersionConstraint;

/// How a depender uses a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DepType {
    Build,
    Link,
    Run,
}

impl DepType {
    pub const ALL: [DepType; 3] = [DepType::Build, DepType::Link, DepType::Run];

    pub fn as_str(&self) -> &'static str {
        match self {
            DepType::Build => "build",
            DepType::Link => "link",
            DepType::Run => "run",
        }
    }

    fn bit(self) -> u8 {
        match self {
            DepType::Build => 0b001,
            DepType::Link => 0b010,
            DepType::Run => 0b100,
        }
    }
}

/// Error for an unknown dependency type name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown dependency type `{0}` (expected build, link or run)")]
pub struct UnknownDepType(pub String);

impl FromStr for DepType {
    type Err = UnknownDepType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(DepType::Build),
            "link" => Ok(DepType::Link),
            "run" => Ok(DepType::Run),
            other => Err(UnknownDepType(other.to_string())),
        }
    }
}

/// A set of [`DepType`]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepTypes(u8);

impl DepTypes {
    pub const NONE: DepTypes = DepTypes(0);
    pub const BUILD: DepTypes = DepTypes(0b001);
    pub const LINK: DepTypes = DepTypes(0b010);
    pub const RUN: DepTypes = DepTypes(0b100);
    pub const BUILD_LINK: DepTypes = DepTypes(0b011);
    pub const ALL: DepTypes = DepTypes(0b111);

    /// `build` and `link`, the type of an undeclared-type dependency.
    pub const DEFAULT: DepTypes = Self::BUILD_LINK;

    pub fn contains(self, ty: DepType) -> bool {
        self.0 & ty.bit() != 0
    }

    /// Whether the two sets share any type.
    pub fn intersects(self, other: DepTypes) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(self, other: DepTypes) -> DepTypes {
        DepTypes(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the dependency must be installed before its depender builds.
    pub fn affects_build(self) -> bool {
        self.intersects(Self::BUILD_LINK)
    }

    pub fn iter(self) -> impl Iterator<Item = DepType> {
        DepType::ALL.into_iter().filter(move |t| self.contains(*t))
    }

    pub fn names(self) -> Vec<&'static str> {
        self.iter().map(|t| t.as_str()).collect()
    }
}

impl Default for DepTypes {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<DepType> for DepTypes {
    fn from(ty: DepType) -> Self {
        DepTypes(ty.bit())
    }
}

impl FromIterator<DepType> for DepTypes {
    fn from_iter<T: IntoIterator<Item = DepType>>(iter: T) -> Self {
        iter.into_iter().fold(DepTypes::NONE, |acc, t| acc | t.into())
    }
}

impl BitOr for DepTypes {
    type Output = DepTypes;

    fn bitor(self, rhs: DepTypes) -> DepTypes {
        self.union(rhs)
    }
}

impl BitOrAssign for DepTypes {
    fn bitor_assign(&mut self, rhs: DepTypes) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for DepTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DepTypes({})", self)
    }
}

impl fmt::Display for DepTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(","))
    }
}

impl Serialize for DepTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.names().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DepTypes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names
            .iter()
            .map(|n| n.parse::<DepType>())
            .collect::<Result<DepTypes, _>>()
            .map_err(serde::de::Error::custom)
    }
}

/// A dependency edge declared by a package recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDecl {
    name: PackageName,
    constraint: VersionConstraint,
    variants: VariantSpec,
    types: DepTypes,
    when: Guard,
}

impl DependencyDecl {
    /// Depend on any version of `name` for build and link.
    pub fn new(name: impl Into<PackageName>) -> Self {
        DependencyDecl {
            name: name.into(),
            constraint: VersionConstraint::any(),
            variants: VariantSpec::new(),
            types: DepTypes::DEFAULT,
            when: Guard::always(),
        }
    }

    pub fn with_constraint(mut self, constraint: VersionConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    /// Request a variant value on the dependency.
    pub fn with_variant(mut self, name: impl Into<String>, value: impl Into<VariantValue>) -> Self {
        self.variants.insert(name, value);
        self
    }

    pub fn with_types(mut self, types: DepTypes) -> Self {
        self.types = types;
        self
    }

    /// Only activate the edge when `guard` holds for the depender.
    pub fn when(mut self, guard: Guard) -> Self {
        self.when = guard;
        self
    }

    pub fn name(&self) -> PackageName {
        self.name
    }

    pub fn constraint(&self) -> &VersionConstraint {
        &self.constraint
    }

    pub fn variants(&self) -> &VariantSpec {
        &self.variants
    }

    pub fn types(&self) -> DepTypes {
        self.types
    }

    pub fn guard(&self) -> &Guard {
        &self.when
    }
}

impl fmt::Display for DependencyDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.constraint.is_any() {
            write!(f, " {}", self.constraint)?;
        }
        if !self.variants.is_empty() {
            write!(f, " {}", self.variants)?;
        }
        write!(f, " ({})", self.types)?;
        if !self.when.is_always() {
            write!(f, " when `{}`", self.when)?;
        }
        Ok(())
    }
}
