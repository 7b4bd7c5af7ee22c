// Copyright 2025 Cowboy AI, LLC.

//! Workflow commands
//!
//! Commands represent intentions to change workflow state. The engine
//! exposes one method per command; [`WorkflowCommand`] is the serializable
//! form for callers that route commands as messages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::decision::DecisionPayload;
use super::initiative::NewInitiative;
use crate::identifiers::{InitiativeId, StageInstanceId};

/// Commands accepted by the workflow engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkflowCommand {
    /// Register a draft initiative
    Register {
        /// Registration input
        initiative: NewInitiative,
    },

    /// Move a draft into the workflow
    Submit {
        /// Draft to submit
        initiative_id: InitiativeId,
    },

    /// Approve the pending stage instance
    Approve {
        /// Instance to approve
        stage_instance_id: StageInstanceId,
        /// Required comment
        comment: String,
        /// Stage-specific decision fields
        #[serde(default)]
        decision: DecisionPayload,
    },

    /// Reject the pending stage instance
    Reject {
        /// Instance to reject
        stage_instance_id: StageInstanceId,
        /// Required comment
        comment: String,
    },

    /// Re-enter the workflow after a rejection
    Resubmit {
        /// Rejected initiative
        initiative_id: InitiativeId,
        /// Required comment
        comment: String,
    },
}

impl WorkflowCommand {
    /// Command name for logging
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowCommand::Register { .. } => "register",
            WorkflowCommand::Submit { .. } => "submit",
            WorkflowCommand::Approve { .. } => "approve",
            WorkflowCommand::Reject { .. } => "reject",
            WorkflowCommand::Resubmit { .. } => "resubmit",
        }
    }
}
