//! Build orchestration.
//!
//! This module drives concretized specs through their build phases and
//! produces the configure arguments for each supported build system.

pub mod args;
pub mod autotools;
pub mod cmake;
pub mod context;
pub mod events;
pub mod exec;
pub mod layout;
pub mod orchestrator;
pub mod phases;
pub mod state;

pub use args::{configure_args, ArgInput, ArgsError};
pub use context::PhaseContext;
pub use events::{BuildEvent, EventSink};
pub use exec::{ExecOutput, Executor, Invocation, ProcessExecutor};
pub use layout::Layout;
pub use orchestrator::{BuildOptions, BuildReport, CancelToken, NodeReport, Orchestrator};
pub use state::{FailureReason, NodeState, Phase, PhaseResult};
