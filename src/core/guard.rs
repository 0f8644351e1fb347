//! Guard expressions on dependency edges and configure arguments.
//!
//! A guard is a whitespace-separated conjunction of terms:
//!
//! | term               | holds when                               |
//! |--------------------|------------------------------------------|
//! | `+name`            | boolean variant `name` is on             |
//! | `~name`            | boolean variant `name` is off            |
//! | `name=value`       | variant `name` has value `value`         |
//! | `platform=darwin`  | the host OS family matches               |
//! | `@>=4.2`           | the depender's version satisfies `>=4.2` |
//!
//! Sigil terms may be chained (`+shared~static`). The empty guard always holds.

use std::fmt;
use std::str::FromStr;

use semver::Version;
use thiserror::Error;

use crate::core::platform::PlatformFacts;
use crate::core::variant::{VariantSpec, VariantValue};
use crate::resolver::version::{VersionConstraint, VersionError};

/// Error parsing a guard expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("empty variant name in guard `{0}`")]
    EmptyName(String),

    #[error("unexpected `{token}` in guard `{guard}`")]
    UnexpectedToken { guard: String, token: String },

    #[error("invalid version in guard `{guard}`: {source}")]
    Version {
        guard: String,
        #[source]
        source: VersionError,
    },
}

/// Keys that refer to platform facts rather than variants.
const PLATFORM_KEYS: [&str; 2] = ["platform", "os"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Enabled(String),
    Disabled(String),
    Equals(String, String),
    Platform(String),
    Version(VersionConstraint),
}

/// Everything a guard can observe about its owner.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub version: &'a Version,
    pub variants: &'a VariantSpec,
    pub platform: &'a PlatformFacts,
}

/// A parsed guard expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    text: String,
    terms: Vec<Term>,
}

impl Guard {
    /// The guard that always holds.
    pub fn always() -> Self {
        Guard {
            text: String::new(),
            terms: Vec::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, GuardError> {
        let text = text.trim();
        let mut terms = Vec::new();

        let mut tokens = text.split_whitespace().peekable();
        while let Some(token) = tokens.next() {
            if let Some(req) = token.strip_prefix('@') {
                let req = version_term(req, &mut tokens);
                let constraint = VersionConstraint::parse(&req).map_err(|source| GuardError::Version {
                    guard: text.to_string(),
                    source,
                })?;
                terms.push(Term::Version(constraint));
            } else if let Some((key, value)) = token.split_once('=') {
                if key.is_empty() || value.is_empty() {
                    return Err(GuardError::UnexpectedToken {
                        guard: text.to_string(),
                        token: token.to_string(),
                    });
                }
                if PLATFORM_KEYS.contains(&key) {
                    terms.push(Term::Platform(value.to_string()));
                } else {
                    terms.push(Term::Equals(key.to_string(), value.to_string()));
                }
            } else if token.starts_with(['+', '~']) {
                parse_sigils(text, token, &mut terms)?;
            } else {
                return Err(GuardError::UnexpectedToken {
                    guard: text.to_string(),
                    token: token.to_string(),
                });
            }
        }

        Ok(Guard {
            text: text.to_string(),
            terms,
        })
    }

    /// Whether every term holds.
    pub fn evaluate(&self, cx: &GuardContext<'_>) -> bool {
        self.terms.iter().all(|term| match term {
            Term::Enabled(name) => cx.variants.get(name) == Some(&VariantValue::Bool(true)),
            Term::Disabled(name) => cx.variants.get(name) == Some(&VariantValue::Bool(false)),
            Term::Equals(name, value) => cx
                .variants
                .get(name)
                .is_some_and(|v| v.to_string() == *value),
            Term::Platform(name) => cx.platform.os.matches(name),
            Term::Version(constraint) => constraint.satisfied_by(cx.version),
        })
    }

    /// Names of the variants this guard reads.
    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|term| match term {
            Term::Enabled(name) | Term::Disabled(name) | Term::Equals(name, _) => {
                Some(name.as_str())
            }
            Term::Platform(_) | Term::Version(_) => None,
        })
    }

    pub fn is_always(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// The rest of a version term. A range continues past whitespace after a
/// comma or a bare operator, as in `@>=2.0, <3.0`.
fn version_term<'a, I>(first: &str, tokens: &mut std::iter::Peekable<I>) -> String
where
    I: Iterator<Item = &'a str>,
{
    let mut req = first.to_string();
    while let Some(next) = tokens.peek() {
        let open = req.is_empty()
            || req.ends_with([',', '<', '>', '=', '^'])
            || next.starts_with(',');
        if !open {
            break;
        }
        if !next.starts_with(',') {
            req.push(' ');
        }
        req.push_str(next);
        tokens.next();
    }
    req
}

fn parse_sigils(guard: &str, token: &str, terms: &mut Vec<Term>) -> Result<(), GuardError> {
    let mut rest = token;
    while let Some(sigil) = rest.chars().next() {
        let body = &rest[sigil.len_utf8()..];
        let end = body.find(['+', '~']).unwrap_or(body.len());
        let name = &body[..end];
        if name.is_empty() {
            return Err(GuardError::EmptyName(guard.to_string()));
        }
        terms.push(match sigil {
            '+' => Term::Enabled(name.to_string()),
            _ => Term::Disabled(name.to_string()),
        });
        rest = &body[end..];
    }
    Ok(())
}

impl FromStr for Guard {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Guard::parse(s)
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
