//! Per-node build state machine.
//!
//! ```text
//! Pending -> Staged -> Configuring -> Built -> Installed -> Verified
//!    \          \           \           \          \
//!     `----------`-----------`-----------`----------`--> Failed
//! ```
//!
//! `Verified` and `Failed` are terminal.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::core::name::PackageName;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Lines of phase output kept in a failure diagnostic.
const OUTPUT_TAIL_LINES: usize = 20;

/// A build phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Stage,
    Configure,
    Build,
    Test,
    Install,
    Verify,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Stage => "stage",
            Phase::Configure => "configure",
            Phase::Build => "build",
            Phase::Test => "test",
            Phase::Install => "install",
            Phase::Verify => "verify",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a node failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, miette::Diagnostic, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FailureReason {
    #[error("{phase} phase failed{}", .exit_code.map(|c| format!(" with exit code {}", c)).unwrap_or_default())]
    #[diagnostic(code(kiln::build::phase_failed))]
    PhaseFailed {
        phase: Phase,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("configure arguments rejected: {message}")]
    #[diagnostic(code(kiln::build::arguments_rejected))]
    ArgumentsRejected { message: String },

    #[error("dependency `{dependency}` failed")]
    #[diagnostic(code(kiln::build::dependency_failed))]
    DependencyFailed { dependency: PackageName },

    #[error("cancelled")]
    #[diagnostic(code(kiln::build::cancelled))]
    Cancelled,
}

impl FailureReason {
    /// Render the failure of `package` for the user.
    ///
    /// Phase output is trimmed to its last lines, which is where build tools
    /// put the error.
    pub fn to_diagnostic(&self, package: &PackageName) -> Diagnostic {
        let diag = Diagnostic::error(format!("`{}`: {}", package, self));
        match self {
            FailureReason::PhaseFailed { output, .. } => {
                let lines: Vec<&str> = output.lines().collect();
                let tail = &lines[lines.len().saturating_sub(OUTPUT_TAIL_LINES)..];
                tail.iter()
                    .fold(diag, |diag, line| diag.with_context(*line))
                    .with_suggestion(suggestions::INSPECT_OUTPUT)
            }
            FailureReason::DependencyFailed { dependency } => {
                diag.with_context(format!("`{}` was not built because `{}` failed", package, dependency))
            }
            _ => diag,
        }
    }
}

/// Where a node is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum NodeState {
    Pending,
    Staged,
    Configuring,
    Built,
    Installed,
    Verified,
    Failed(FailureReason),
}

/// An illegal state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition for `{package}`: {from} -> {to}")]
pub struct TransitionError {
    pub package: PackageName,
    pub from: &'static str,
    pub to: &'static str,
}

impl NodeState {
    pub fn name(&self) -> &'static str {
        match self {
            NodeState::Pending => "pending",
            NodeState::Staged => "staged",
            NodeState::Configuring => "configuring",
            NodeState::Built => "built",
            NodeState::Installed => "installed",
            NodeState::Verified => "verified",
            NodeState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Verified | NodeState::Failed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, NodeState::Failed(_))
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            NodeState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Whether `next` may follow this state.
    pub fn can_transition_to(&self, next: &NodeState) -> bool {
        use NodeState::*;
        match (self, next) {
            (Verified | Failed(_), _) => false,
            (_, Failed(_)) => true,
            (Pending, Staged)
            | (Staged, Configuring)
            | (Configuring, Built)
            | (Built, Installed)
            | (Installed, Verified) => true,
            _ => false,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Failed(reason) => write!(f, "failed ({})", reason),
            other => f.write_str(other.name()),
        }
    }
}

/// Outcome of one phase of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseResult {
    pub phase: Phase,
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Combined output of every command the phase ran.
    pub output: String,
    /// Command lines, in execution order.
    pub commands: Vec<String>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl PhaseResult {
    /// The failure this result represents, if any.
    pub fn failure(&self) -> Option<FailureReason> {
        (!self.success).then(|| FailureReason::PhaseFailed {
            phase: self.phase,
            exit_code: self.exit_code,
            output: self.output.clone(),
        })
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
