//! Interned package names.
//!
//! A [`PackageName`] is stored once in a global interner, so equality is a
//! pointer comparison and copies are free. Graph nodes, registry keys and
//! solver work lists all carry names by value.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{LazyLock, PoisonError, RwLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

static NAMES: LazyLock<RwLock<HashSet<&'static str>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

/// Error returned for names that cannot identify a package.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid package name `{name}`: {reason}")]
pub struct InvalidNameError {
    pub name: String,
    pub reason: &'static str,
}

/// An interned package identifier.
#[derive(Clone, Copy)]
pub struct PackageName {
    inner: &'static str,
}

impl PackageName {
    /// Intern a name without validating it.
    pub fn new(s: impl AsRef<str>) -> Self {
        let s = s.as_ref();

        {
            let names = NAMES.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(&interned) = names.get(s) {
                return PackageName { inner: interned };
            }
        }

        let mut names = NAMES.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(&interned) = names.get(s) {
            return PackageName { inner: interned };
        }

        let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
        names.insert(leaked);
        PackageName { inner: leaked }
    }

    /// Validate and intern a name.
    ///
    /// Names start with a lowercase letter or digit and contain only
    /// lowercase letters, digits, `-`, `_` and `.`.
    pub fn parse(s: &str) -> Result<Self, InvalidNameError> {
        let invalid = |reason| InvalidNameError {
            name: s.to_string(),
            reason,
        };

        let first = s.chars().next().ok_or_else(|| invalid("name is empty"))?;
        if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
            return Err(invalid("must start with a lowercase letter or digit"));
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.')))
        {
            return Err(InvalidNameError {
                name: s.to_string(),
                reason: if bad.is_ascii_uppercase() {
                    "uppercase letters are not allowed"
                } else {
                    "only `-`, `_` and `.` may separate words"
                },
            });
        }

        Ok(Self::new(s))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.inner
    }
}

impl Deref for PackageName {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        self.inner
    }
}

impl AsRef<str> for PackageName {
    #[inline]
    fn as_ref(&self) -> &str {
        self.inner
    }
}

impl Borrow<str> for PackageName {
    #[inline]
    fn borrow(&self) -> &str {
        self.inner
    }
}

impl PartialEq for PackageName {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for PackageName {}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.inner == other
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.inner == *other
    }
}

impl PartialOrd for PackageName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(other.inner)
    }
}

// Hash the contents so lookups through `Borrow<str>` agree with `str`'s hash.
impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl fmt::Debug for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner, f)
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.inner)
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        PackageName::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        PackageName::new(s)
    }
}

impl Serialize for PackageName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.inner)
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PackageName::parse(&s).map_err(serde::de::Error::custom)
    }
}
