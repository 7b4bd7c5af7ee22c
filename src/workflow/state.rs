// Copyright 2025 Cowboy AI, LLC.

//! Lifecycle states of initiatives and stage instances

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

use crate::errors::{WorkflowError, WorkflowResult};

/// A named state in a lifecycle
pub trait State: Debug + Clone + PartialEq + Eq + Send + Sync {
    /// Get the name of this state for logging/debugging
    fn name(&self) -> &'static str;

    /// Check if this is a terminal state
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Lifecycle status of an initiative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum InitiativeStatus {
    /// Registered but not yet submitted into the workflow
    Draft,
    /// Moving through the stage sequence
    InProgress,
    /// Final stage approved
    Closed,
    /// A stage was rejected; waiting for resubmission
    Rejected,
}

impl InitiativeStatus {
    /// Every status, in lifecycle order
    pub const ALL: [InitiativeStatus; 4] = [
        InitiativeStatus::Draft,
        InitiativeStatus::InProgress,
        InitiativeStatus::Closed,
        InitiativeStatus::Rejected,
    ];

    /// Whether the lifecycle allows moving to `target`
    pub fn can_transition_to(&self, target: InitiativeStatus) -> bool {
        use InitiativeStatus::*;
        matches!(
            (self, target),
            (Draft, InProgress) | (InProgress, Closed) | (InProgress, Rejected) | (Rejected, InProgress)
        )
    }

    /// `Ok(target)` when allowed, `InvalidStateTransition` otherwise
    pub fn transition_to(&self, target: InitiativeStatus) -> WorkflowResult<InitiativeStatus> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(WorkflowError::InvalidStateTransition {
                from: self.name().to_string(),
                to: target.name().to_string(),
            })
        }
    }
}

impl State for InitiativeStatus {
    fn name(&self) -> &'static str {
        match self {
            InitiativeStatus::Draft => "Draft",
            InitiativeStatus::InProgress => "InProgress",
            InitiativeStatus::Closed => "Closed",
            InitiativeStatus::Rejected => "Rejected",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, InitiativeStatus::Closed)
    }
}

impl fmt::Display for InitiativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Status of one stage instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Waiting for a decision; at most one per initiative
    Pending,
    /// Approved; immutable from here on
    Approved,
    /// Rejected; immutable from here on
    Rejected,
}

impl State for StageStatus {
    fn name(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Approved => "approved",
            StageStatus::Rejected => "rejected",
        }
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, StageStatus::Pending)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an initiative sits in the workflow state machine
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> NotSubmitted
///     NotSubmitted --> AtStage: submit
///     AtStage --> AtStage: approve
///     AtStage --> Closed: approve last stage
///     AtStage --> Rejected: reject
///     Rejected --> AtStage: resubmit
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum WorkflowPosition {
    /// Draft initiative
    NotSubmitted,
    /// The pending stage number
    AtStage(u8),
    /// Completed
    Closed,
    /// Returned to the submitter at the given stage
    Rejected(u8),
}

impl State for WorkflowPosition {
    fn name(&self) -> &'static str {
        match self {
            WorkflowPosition::NotSubmitted => "NotSubmitted",
            WorkflowPosition::AtStage(_) => "AtStage",
            WorkflowPosition::Closed => "Closed",
            WorkflowPosition::Rejected(_) => "Rejected",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, WorkflowPosition::Closed)
    }
}
