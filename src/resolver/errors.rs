//! Concretization error types and diagnostics.

use std::fmt;

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// One link of a constraint chain: who demanded what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintOrigin {
    /// Path from the root to the demanding package, root first.
    pub path: Vec<String>,
    /// The demanded package.
    pub package: String,
    /// Rendered demand, e.g. `>=2.0` or `+shared`.
    pub demand: String,
}

impl fmt::Display for ConstraintOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requester = if self.path.is_empty() {
            "request".to_string()
        } else {
            self.path.join(" -> ")
        };
        write!(f, "{} requires {}", requester, self.package)?;
        if !self.demand.is_empty() {
            write!(f, " {}", self.demand)?;
        }
        Ok(())
    }
}

/// Error during concretization. No partial graph accompanies any of these.
#[derive(Debug, Clone, Error, miette::Diagnostic)]
pub enum SolveError {
    #[error("no version of `{package}` satisfies {constraint}")]
    #[diagnostic(code(kiln::solve::unsatisfiable), help("relax one of the version constraints"))]
    Unsatisfiable {
        package: String,
        constraint: String,
        available: Vec<String>,
        chain: Vec<ConstraintOrigin>,
    },

    #[error("conflicting values for variant `{variant}` of `{package}`")]
    #[diagnostic(code(kiln::solve::conflicting_variant))]
    ConflictingVariant {
        package: String,
        variant: String,
        chain: Vec<ConstraintOrigin>,
    },

    #[error("cyclic build dependency: {}", packages.join(" -> "))]
    #[diagnostic(code(kiln::solve::cycle))]
    CyclicDependency { packages: Vec<String> },

    #[error("package `{package}` is not registered")]
    #[diagnostic(code(kiln::solve::unknown_package))]
    UnknownPackage {
        package: String,
        suggestions: Vec<String>,
        chain: Vec<ConstraintOrigin>,
    },

    #[error("`{package}` has no variant `{variant}`")]
    #[diagnostic(code(kiln::solve::unknown_variant))]
    UnknownVariant {
        package: String,
        variant: String,
        chain: Vec<ConstraintOrigin>,
    },

    #[error("`{value}` is not a legal value for variant `{variant}` of `{package}`")]
    #[diagnostic(code(kiln::solve::illegal_value))]
    IllegalVariantValue {
        package: String,
        variant: String,
        value: String,
        legal: Vec<String>,
        chain: Vec<ConstraintOrigin>,
    },

    #[error("concretization of `{root}` did not settle after {steps} steps")]
    #[diagnostic(code(kiln::solve::did_not_converge))]
    DidNotConverge { root: String, steps: usize },
}

impl SolveError {
    /// The constraint chain behind this error, if any.
    pub fn chain(&self) -> &[ConstraintOrigin] {
        match self {
            SolveError::Unsatisfiable { chain, .. }
            | SolveError::ConflictingVariant { chain, .. }
            | SolveError::UnknownPackage { chain, .. }
            | SolveError::UnknownVariant { chain, .. }
            | SolveError::IllegalVariantValue { chain, .. } => chain,
            SolveError::CyclicDependency { .. } | SolveError::DidNotConverge { .. } => &[],
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.to_string());
        for origin in self.chain() {
            diag = diag.with_context(origin.to_string());
        }

        match self {
            SolveError::Unsatisfiable { available, .. } => {
                if !available.is_empty() {
                    diag = diag.with_context(format!("declared versions: {}", available.join(", ")));
                }
                diag.with_suggestion(suggestions::RELAX_VERSION)
            }
            SolveError::ConflictingVariant { .. } => diag.with_suggestion(suggestions::ALIGN_VARIANTS),
            SolveError::CyclicDependency { .. } => diag.with_suggestion(suggestions::BREAK_CYCLE),
            SolveError::UnknownPackage { suggestions: similar, .. } => {
                if !similar.is_empty() {
                    diag = diag.with_context(format!("did you mean: {}?", similar.join(", ")));
                }
                diag.with_suggestion(suggestions::UNKNOWN_PACKAGE)
            }
            SolveError::IllegalVariantValue { legal, .. } => {
                diag.with_suggestion(format!("use one of: {}", legal.join(", ")))
            }
            SolveError::UnknownVariant { package, .. } => {
                diag.with_suggestion(format!("check the variants declared by `{}`", package))
            }
            SolveError::DidNotConverge { .. } => diag.with_suggestion(
                "pin the versions of packages whose dependencies change between versions",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(path: &[&str], package: &str, demand: &str) -> ConstraintOrigin {
        ConstraintOrigin {
            path: path.iter().map(|s| s.to_string()).collect(),
            package: package.to_string(),
            demand: demand.to_string(),
        }
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(
            origin(&["octave", "netcdf"], "hdf5", ">=2.0").to_string(),
            "octave -> netcdf requires hdf5 >=2.0"
        );
        assert_eq!(origin(&[], "octave", "").to_string(), "request requires octave");
    }

    #[test]
    fn test_unsatisfiable_diagnostic() {
        let err = SolveError::Unsatisfiable {
            package: "hdf5".to_string(),
            constraint: ">=2.0, <1.10".to_string(),
            available: vec!["1.8.0".to_string(), "1.14.3".to_string()],
            chain: vec![
                origin(&["app", "netcdf"], "hdf5", ">=2.0"),
                origin(&["app"], "hdf5", "<1.10"),
            ],
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("no version of `hdf5`"));
        assert!(output.contains("app -> netcdf requires hdf5 >=2.0"));
        assert!(output.contains("declared versions: 1.8.0, 1.14.3"));
        assert!(output.contains("relax one of the version constraints"));
    }

    #[test]
    fn test_cycle_message() {
        let err = SolveError::CyclicDependency {
            packages: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic build dependency: a -> b -> a");
        assert!(err.chain().is_empty());
    }
}
