//! Build event types for JSON output.
//!
//! The orchestrator reports progress as a stream of [`BuildEvent`]s sent to
//! an optional sink. Each event serializes to one JSON object.
//!
//! # Event Types
//!
//! - `build-started`: the plan has been accepted
//! - `state-changed`: a node moved to a new state
//! - `phase-finished`: a phase of one node completed
//! - `build-finished`: every node reached a terminal state
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use serde::Serialize;

use crate::builder::state::{NodeState, Phase};

/// A build event emitted during orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    /// Orchestration started.
    #[serde(rename = "build-started")]
    BuildStarted {
        /// Root spec (e.g., "octave@4.4.1 /abcdef0")
        root: String,
        /// Number of nodes in the plan
        package_count: usize,
        /// Worker count
        jobs: usize,
    },

    /// A node changed state.
    #[serde(rename = "state-changed")]
    StateChanged {
        /// Global sequence number of this transition
        seq: u64,
        package: String,
        #[serde(flatten)]
        state: NodeState,
    },

    /// A phase of one node completed.
    #[serde(rename = "phase-finished")]
    PhaseFinished {
        package: String,
        phase: Phase,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        duration_ms: u64,
    },

    /// Every node is terminal.
    #[serde(rename = "build-finished")]
    BuildFinished {
        /// Whether every node was verified
        success: bool,
        verified: usize,
        failed: usize,
        /// Total duration in milliseconds
        duration_ms: u64,
    },
}

impl BuildEvent {
    /// Create a state change event.
    pub fn state_changed(seq: u64, package: impl Into<String>, state: NodeState) -> Self {
        BuildEvent::StateChanged {
            seq,
            package: package.into(),
            state,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Serialize this event to a pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Receives build events. Called from the scheduling thread only.
pub type EventSink = Box<dyn FnMut(&BuildEvent) + Send>;
