//! Concretization.
//!
//! Turns an abstract request into a fully-resolved [`SpecGraph`]. The solver
//! is pure and deterministic: all recipe I/O happens before the registry is
//! frozen, and identical inputs produce identical graphs.

pub mod encode;
pub mod errors;
pub mod merge;
pub mod resolve;
pub mod solver;
pub mod version;

pub use encode::SpecLock;
pub use errors::{ConstraintOrigin, SolveError};
pub use merge::Demand;
pub use resolve::SpecGraph;
pub use solver::Solver;
pub use version::VersionConstraint;

use crate::core::platform::PlatformFacts;
use crate::core::registry::Registry;
use crate::core::spec::AbstractSpec;

/// Concretize `request` against `registry` with default solver settings.
pub fn concretize(
    registry: &Registry,
    platform: &PlatformFacts,
    request: &AbstractSpec,
) -> Result<SpecGraph, SolveError> {
    Solver::new(registry, platform.clone()).solve(request)
}
