//! Abstract and concrete specs.
//!
//! An [`AbstractSpec`] is what a user asks for: a name plus whatever
//! constraints they care about. A [`ConcreteSpec`] is what the solver hands
//! back: every field fixed and hashed. Concrete specs are never edited;
//! re-solving builds new ones.

use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::name::{InvalidNameError, PackageName};
use crate::core::package::PackageDeclaration;
use crate::core::variant::{VariantSpec, VariantValue};
use crate::resolver::version::{VersionConstraint, VersionError};
use crate::util::hash::Fingerprint;

/// Compiler identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompilerSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CompilerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        CompilerSpec {
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl Default for CompilerSpec {
    fn default() -> Self {
        CompilerSpec::new("gcc")
    }
}

impl FromStr for CompilerSpec {
    type Err = SpecParseError;

    /// Parse `gcc` or `gcc@12.2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = match s.split_once('@') {
            Some((name, version)) => (name, Some(version)),
            None => (s, None),
        };
        if name.is_empty() || version.is_some_and(str::is_empty) {
            return Err(SpecParseError::InvalidCompiler(s.to_string()));
        }
        Ok(CompilerSpec {
            name: name.to_string(),
            version: version.map(str::to_string),
        })
    }
}

impl fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => f.write_str(&self.name),
        }
    }
}

/// Compiler and linker flag groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerFlags {
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub fflags: Vec<String>,
    pub cppflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub ldlibs: Vec<String>,
}

impl CompilerFlags {
    /// Group names, in a fixed order.
    pub const GROUPS: [&'static str; 6] =
        ["cflags", "cxxflags", "fflags", "cppflags", "ldflags", "ldlibs"];

    pub fn group(&self, name: &str) -> Option<&[String]> {
        match name {
            "cflags" => Some(&self.cflags),
            "cxxflags" => Some(&self.cxxflags),
            "fflags" => Some(&self.fflags),
            "cppflags" => Some(&self.cppflags),
            "ldflags" => Some(&self.ldflags),
            "ldlibs" => Some(&self.ldlibs),
            _ => None,
        }
    }

    fn group_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        match name {
            "cflags" => Some(&mut self.cflags),
            "cxxflags" => Some(&mut self.cxxflags),
            "fflags" => Some(&mut self.fflags),
            "cppflags" => Some(&mut self.cppflags),
            "ldflags" => Some(&mut self.ldflags),
            "ldlibs" => Some(&mut self.ldlibs),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        Self::GROUPS
            .iter()
            .all(|g| self.group(g).map_or(true, |flags| flags.is_empty()))
    }
}

/// Error parsing an abstract spec.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpecParseError {
    #[error("empty spec")]
    Empty,

    #[error(transparent)]
    Name(#[from] InvalidNameError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("invalid compiler `{0}`")]
    InvalidCompiler(String),

    #[error("unexpected `{0}` in spec")]
    UnexpectedToken(String),
}

/// A user request: possibly under-specified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractSpec {
    pub name: PackageName,
    pub constraint: VersionConstraint,
    pub variants: VariantSpec,
    pub compiler: Option<CompilerSpec>,
    pub flags: CompilerFlags,
}

impl AbstractSpec {
    pub fn new(name: impl Into<PackageName>) -> Self {
        AbstractSpec {
            name: name.into(),
            constraint: VersionConstraint::any(),
            variants: VariantSpec::new(),
            compiler: None,
            flags: CompilerFlags::default(),
        }
    }

    pub fn with_constraint(mut self, constraint: VersionConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn with_variant(mut self, name: impl Into<String>, value: impl Into<VariantValue>) -> Self {
        self.variants.insert(name, value);
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerSpec) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn with_flags(mut self, flags: CompilerFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Parse `name[@constraint] [+v] [~v] [k=v] [flag-group=flag] [%compiler]`.
    pub fn parse(text: &str) -> Result<Self, SpecParseError> {
        let mut tokens = text.split_whitespace();
        let head = tokens.next().ok_or(SpecParseError::Empty)?;
        let (name, constraint) = match head.split_once('@') {
            Some((name, req)) => (name, Some(req)),
            None => (head, None),
        };

        let mut spec = AbstractSpec::new(PackageName::parse(name)?);
        if let Some(req) = constraint {
            spec.constraint = VersionConstraint::parse(req)?;
        }

        for token in tokens {
            if let Some(req) = token.strip_prefix('@') {
                spec.constraint = spec.constraint.intersect(&VersionConstraint::parse(req)?);
            } else if let Some(compiler) = token.strip_prefix('%') {
                spec.compiler = Some(compiler.parse()?);
            } else if let Some((key, value)) = token.split_once('=') {
                if key.is_empty() || value.is_empty() {
                    return Err(SpecParseError::UnexpectedToken(token.to_string()));
                }
                match spec.flags.group_mut(key) {
                    Some(group) => group.push(value.to_string()),
                    None => {
                        spec.variants.insert(key, VariantValue::parse(value));
                    }
                }
            } else if token.starts_with(['+', '~']) {
                let mut rest = token;
                while let Some(sigil) = rest.chars().next() {
                    let body = &rest[1..];
                    let end = body.find(['+', '~']).unwrap_or(body.len());
                    if end == 0 {
                        return Err(SpecParseError::UnexpectedToken(token.to_string()));
                    }
                    spec.variants.insert(&body[..end], sigil == '+');
                    rest = &body[end..];
                }
            } else {
                return Err(SpecParseError::UnexpectedToken(token.to_string()));
            }
        }

        Ok(spec)
    }

    /// Whether this request already pins everything `decl` declares.
    pub fn is_concrete(&self, decl: &PackageDeclaration) -> bool {
        let pinned = self
            .constraint
            .as_exact()
            .is_some_and(|v| decl.versions().iter().any(|d| &d.version == v));
        let assigned = decl.variants().iter().all(|var| {
            self.variants
                .get(var.name())
                .is_some_and(|value| var.coerce(value).is_some())
        });
        let no_extras = self.variants.names().all(|n| decl.variant(n).is_some());
        pinned && assigned && no_extras && self.compiler.is_some()
    }
}

impl FromStr for AbstractSpec {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AbstractSpec::parse(s)
    }
}

impl fmt::Display for AbstractSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.constraint.is_any() {
            write!(f, "@{}", self.constraint)?;
        }
        if !self.variants.is_empty() {
            write!(f, " {}", self.variants)?;
        }
        if let Some(compiler) = &self.compiler {
            write!(f, " %{}", compiler)?;
        }
        Ok(())
    }
}

/// Content hash of a concrete spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecHash(String);

impl SpecHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first seven characters, as used in directory names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(7)]
    }
}

impl fmt::Display for SpecHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully-resolved package build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteSpec {
    name: PackageName,
    version: Version,
    variants: VariantSpec,
    compiler: CompilerSpec,
    flags: CompilerFlags,
    identity: SpecHash,
    hash: SpecHash,
}

impl ConcreteSpec {
    pub(crate) fn new(
        name: PackageName,
        version: Version,
        variants: VariantSpec,
        compiler: CompilerSpec,
        flags: CompilerFlags,
    ) -> Self {
        let mut fp = Fingerprint::new();
        fp.update_str(name.as_str())
            .update_str(&version.to_string())
            .update_str(&compiler.name)
            .update_opt(compiler.version.as_deref());
        fp.update_str(&variants.len().to_string());
        for (key, value) in variants.iter() {
            fp.update_kv(key, &value.to_string());
        }
        for group in CompilerFlags::GROUPS {
            let flags = flags.group(group).unwrap_or_default();
            fp.update_str(group)
                .update_strs(flags.iter().map(String::as_str));
        }
        let identity = SpecHash(fp.finish());

        ConcreteSpec {
            name,
            version,
            variants,
            compiler,
            flags,
            hash: identity.clone(),
            identity,
        }
    }

    /// Fold the direct dependencies into the DAG hash.
    ///
    /// `deps` are (identity hash, edge types) pairs and must be sorted.
    pub(crate) fn seal<'a>(&mut self, deps: impl IntoIterator<Item = (&'a SpecHash, String)>) {
        let mut fp = Fingerprint::new();
        fp.update_str(self.identity.as_str());
        for (dep, types) in deps {
            fp.update_kv(dep.as_str(), &types);
        }
        self.hash = SpecHash(fp.finish());
    }

    pub fn name(&self) -> PackageName {
        self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn variants(&self) -> &VariantSpec {
        &self.variants
    }

    pub fn compiler(&self) -> &CompilerSpec {
        &self.compiler
    }

    pub fn flags(&self) -> &CompilerFlags {
        &self.flags
    }

    /// Hash of this node alone: name, version, variants, compiler and flags.
    pub fn identity(&self) -> &SpecHash {
        &self.identity
    }

    /// Hash of this node and its direct dependencies.
    pub fn hash(&self) -> &SpecHash {
        &self.hash
    }

    /// Check the concreteness invariant against a declaration: the version
    /// is declared and every declared variant, and nothing else, has a
    /// legal value.
    pub fn is_concrete(&self, decl: &PackageDeclaration) -> bool {
        decl.versions().iter().any(|d| d.version == self.version)
            && decl.variants().len() == self.variants.len()
            && decl.variants().iter().all(|var| {
                self.variants
                    .get(var.name())
                    .is_some_and(|value| var.coerce(value).as_ref() == Some(value))
            })
    }

    /// The spec as a request that would reproduce it.
    pub fn to_abstract(&self) -> AbstractSpec {
        AbstractSpec {
            name: self.name,
            constraint: VersionConstraint::exact(self.version.clone()),
            variants: self.variants.clone(),
            compiler: Some(self.compiler.clone()),
            flags: self.flags.clone(),
        }
    }
}

impl fmt::Display for ConcreteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)?;
        if !self.variants.is_empty() {
            write!(f, " {}", self.variants)?;
        }
        write!(f, " %{} /{}", self.compiler, self.hash.short())
    }
}
