//! Variants: named, typed build options declared per package.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the implicit build-type variant carried by CMake packages.
pub const BUILD_TYPE_VARIANT: &str = "build_type";

/// CMake build types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum BuildType {
    Debug,
    Release,
    #[default]
    RelWithDebInfo,
    MinSizeRel,
}

impl BuildType {
    /// Every legal build type, in declaration order.
    pub const ALL: [BuildType; 4] = [
        BuildType::Debug,
        BuildType::Release,
        BuildType::RelWithDebInfo,
        BuildType::MinSizeRel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "Debug",
            BuildType::Release => "Release",
            BuildType::RelWithDebInfo => "RelWithDebInfo",
            BuildType::MinSizeRel => "MinSizeRel",
        }
    }

    /// Legal names as owned strings, for variant declarations and diagnostics.
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|b| b.as_str().to_string()).collect()
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unknown build type name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown build type `{0}`")]
pub struct UnknownBuildType(pub String);

impl FromStr for BuildType {
    type Err = UnknownBuildType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| UnknownBuildType(s.to_string()))
    }
}

/// The value of one variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
    Bool(bool),
    Choice(String),
}

impl VariantValue {
    /// Parse textual input. `true` and `false` become booleans.
    pub fn parse(text: &str) -> Self {
        match text {
            "true" => VariantValue::Bool(true),
            "false" => VariantValue::Bool(false),
            other => VariantValue::Choice(other.to_string()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariantValue::Bool(b) => Some(*b),
            VariantValue::Choice(_) => None,
        }
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantValue::Bool(b) => write!(f, "{}", b),
            VariantValue::Choice(s) => f.write_str(s),
        }
    }
}

impl From<bool> for VariantValue {
    fn from(b: bool) -> Self {
        VariantValue::Bool(b)
    }
}

impl From<&str> for VariantValue {
    fn from(s: &str) -> Self {
        VariantValue::parse(s)
    }
}

/// What values a variant may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantKind {
    Bool,
    Enum { values: Vec<String> },
    BuildType { values: Vec<String> },
}

/// Error building a variant declaration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VariantDeclError {
    #[error("default `{default}` of variant `{variant}` is not one of: {}", legal.join(", "))]
    IllegalDefault {
        variant: String,
        default: String,
        legal: Vec<String>,
    },

    #[error("variant `{0}` declares no values")]
    NoValues(String),
}

/// A variant declared by a package recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDecl {
    name: String,
    kind: VariantKind,
    default: VariantValue,
    description: String,
}

impl VariantDecl {
    /// A boolean variant.
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        VariantDecl {
            name: name.into(),
            kind: VariantKind::Bool,
            default: VariantValue::Bool(default),
            description: String::new(),
        }
    }

    /// An enum variant; the default must be one of `values`.
    pub fn choice<I, S>(
        name: impl Into<String>,
        default: impl Into<String>,
        values: I,
    ) -> Result<Self, VariantDeclError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        Self::checked(name.into(), values, default.into(), |values| VariantKind::Enum { values })
    }

    /// The CMake build-type variant, defaulting to `RelWithDebInfo`.
    pub fn build_type() -> Self {
        VariantDecl {
            name: BUILD_TYPE_VARIANT.to_string(),
            kind: VariantKind::BuildType {
                values: BuildType::names(),
            },
            default: VariantValue::Choice(BuildType::default().to_string()),
            description: "CMake build type".to_string(),
        }
    }

    /// A build-type variant with a custom value set, as some recipes declare.
    pub fn build_type_with<I, S>(default: impl Into<String>, values: I) -> Result<Self, VariantDeclError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        Self::checked(
            BUILD_TYPE_VARIANT.to_string(),
            values,
            default.into(),
            |values| VariantKind::BuildType { values },
        )
    }

    fn checked(
        name: String,
        values: Vec<String>,
        default: String,
        kind: fn(Vec<String>) -> VariantKind,
    ) -> Result<Self, VariantDeclError> {
        if values.is_empty() {
            return Err(VariantDeclError::NoValues(name));
        }
        if !values.contains(&default) {
            return Err(VariantDeclError::IllegalDefault {
                variant: name,
                default,
                legal: values,
            });
        }
        Ok(VariantDecl {
            name,
            kind: kind(values),
            default: VariantValue::Choice(default),
            description: String::new(),
        })
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &VariantKind {
        &self.kind
    }

    pub fn default_value(&self) -> &VariantValue {
        &self.default
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Normalize a requested value to this variant's type.
    ///
    /// Returns `None` when the value is not legal for this variant.
    pub fn coerce(&self, value: &VariantValue) -> Option<VariantValue> {
        match (&self.kind, value) {
            (VariantKind::Bool, VariantValue::Bool(_)) => Some(value.clone()),
            (VariantKind::Bool, VariantValue::Choice(_)) => None,
            (VariantKind::Enum { values } | VariantKind::BuildType { values }, _) => {
                let text = value.to_string();
                values
                    .contains(&text)
                    .then_some(VariantValue::Choice(text))
            }
        }
    }

    /// Legal values as text, for diagnostics.
    pub fn legal_values(&self) -> Vec<String> {
        match &self.kind {
            VariantKind::Bool => vec!["true".to_string(), "false".to_string()],
            VariantKind::Enum { values } | VariantKind::BuildType { values } => values.clone(),
        }
    }
}

/// An ordered assignment of values to variant names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantSpec(BTreeMap<String, VariantValue>);

impl VariantSpec {
    pub fn new() -> Self {
        VariantSpec(BTreeMap::new())
    }

    /// Builder-style insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<VariantValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a variant, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<VariantValue>,
    ) -> Option<VariantValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&VariantValue> {
        self.0.get(name)
    }

    /// Whether a boolean variant is set to `true`.
    pub fn is_enabled(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(VariantValue::Bool(true)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariantValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, VariantValue)> for VariantSpec {
    fn from_iter<T: IntoIterator<Item = (String, VariantValue)>>(iter: T) -> Self {
        VariantSpec(iter.into_iter().collect())
    }
}

/// Renders as `+on ~off name=value`, sorted by name.
impl fmt::Display for VariantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            match value {
                VariantValue::Bool(true) => write!(f, "+{}", name)?,
                VariantValue::Bool(false) => write!(f, "~{}", name)?,
                VariantValue::Choice(v) => write!(f, "{}={}", name, v)?,
            }
        }
        Ok(())
    }
}
