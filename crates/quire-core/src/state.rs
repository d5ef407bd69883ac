//! Document build-state machine.
//!
//! ```text
//!  Idle ──RequestBuild──► ReadyForBuilding ──Started──► BuildingInProgress ──Finished──► Idle
//!                               │                            │
//!                               └────────RequestStop─────────┴──► BuildingToStop ──Stopped──► Idle
//! ```
//!
//! `Abort` returns to `Idle` from anywhere; it is used when a build reports a
//! configuration failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    #[default]
    Idle,
    ReadyForBuilding,
    BuildingInProgress,
    BuildingToStop,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Idle => "idle",
            BuildState::ReadyForBuilding => "ready_for_building",
            BuildState::BuildingInProgress => "building_in_progress",
            BuildState::BuildingToStop => "building_to_stop",
        };
        f.write_str(name)
    }
}

/// Which jobs a build request should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    Build,
    ForwardSync,
    BackwardSync,
    #[default]
    BuildAndForwardSync,
}

impl std::str::FromStr for BuildMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "build" => Ok(BuildMode::Build),
            "forward_sync" => Ok(BuildMode::ForwardSync),
            "backward_sync" => Ok(BuildMode::BackwardSync),
            "build_and_forward_sync" => Ok(BuildMode::BuildAndForwardSync),
            other => Err(anyhow::anyhow!("Unknown build mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildEvent {
    /// The UI asks for a build or sync.
    RequestBuild,
    /// The UI asks to stop the running build.
    RequestStop,
    /// The engine started working on the query.
    Started,
    /// The engine confirmed a stop.
    Stopped,
    /// The engine delivered a result.
    Finished,
    /// Processing ended early because of a configuration failure.
    Abort,
}

/// Emitted on entering one of the transient states; observed by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildSignal {
    ReadyForBuilding,
    BuildingToStop,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("invalid build-state transition: {event:?} while {from}")]
    InvalidTransition { from: BuildState, event: BuildEvent },
}

/// Owns a document's [`BuildState`]; every change goes through [`apply`](Self::apply).
#[derive(Debug, Clone, Default)]
pub struct BuildStateMachine {
    state: BuildState,
}

impl BuildStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Applies `event`, returning the signal to emit if the new state is one
    /// the controller reacts to. The state is left untouched on error.
    pub fn apply(&mut self, event: BuildEvent) -> Result<Option<BuildSignal>, StateError> {
        use BuildEvent::*;
        use BuildState::*;

        let (next, signal) = match (self.state, event) {
            (Idle, RequestBuild) => (ReadyForBuilding, Some(BuildSignal::ReadyForBuilding)),
            (ReadyForBuilding, Started) => (BuildingInProgress, None),
            // Stop was requested before the engine picked the query up.
            (BuildingToStop, Started) => (BuildingToStop, None),
            (ReadyForBuilding | BuildingInProgress, RequestStop) => {
                (BuildingToStop, Some(BuildSignal::BuildingToStop))
            }
            (BuildingInProgress | BuildingToStop, Stopped) => (Idle, None),
            (BuildingInProgress, Finished) => (Idle, None),
            (_, Abort) => (Idle, None),
            (from, event) => return Err(StateError::InvalidTransition { from, event }),
        };

        self.state = next;
        Ok(signal)
    }
}
