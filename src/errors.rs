// Copyright 2025 Cowboy AI, LLC.

//! Error types for workflow operations

use crate::roles::Role;
use thiserror::Error;

/// Errors that can occur in workflow operations
///
/// Every variant is terminal to the single call that produced it. The engine
/// never retries internally and never leaves an initiative or stage instance
/// partially updated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// The acting user's role does not grant the capability the stage requires
    #[error("Unauthorized: role {role} cannot act on a stage requiring {required}")]
    Unauthorized {
        /// Role held by the acting user
        role: Role,
        /// Role required by the stage
        required: Role,
    },

    /// The acting user holds the right role but is not the assigned approver
    #[error("Unauthorized: stage {stage_number} is assigned to another user")]
    NotAssignedApprover {
        /// Stage number of the instance
        stage_number: u8,
    },

    /// The acting user's site does not cover the initiative's site
    #[error("Unauthorized: user at site {user_site} cannot act for site {initiative_site}")]
    OutsideSite {
        /// Site of the acting user
        user_site: String,
        /// Site of the initiative
        initiative_site: String,
    },

    /// Missing or invalid required field
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Nobody can take the next stage
    #[error("No eligible approver with role {role} at site {site}")]
    NoEligibleApprover {
        /// Role that resolved to zero users
        role: Role,
        /// Site of the initiative
        site: String,
    },

    /// Concurrent-modification conflict
    #[error("Stale stage state: {reason}")]
    StaleStageState {
        /// What changed underneath the caller
        reason: String,
    },

    /// Unknown initiative, stage instance or user
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity that wasn't found
        entity_type: String,
        /// ID that was searched for
        id: String,
    },

    /// Initiative lifecycle transition that is not allowed
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state
        from: String,
        /// Attempted target state
        to: String,
    },

    /// Backing store failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Serialization(err.to_string())
    }
}

impl WorkflowError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        WorkflowError::ValidationError(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(entity_type: &str, id: impl ToString) -> Self {
        WorkflowError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Create a stale-state error
    pub fn stale(reason: impl Into<String>) -> Self {
        WorkflowError::StaleStageState {
            reason: reason.into(),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkflowError::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(self, WorkflowError::ValidationError(_))
    }

    /// Check if this is a concurrency error
    pub fn is_concurrency_error(&self) -> bool {
        matches!(self, WorkflowError::StaleStageState { .. })
    }

    /// Check if this is an authorization error
    pub fn is_authorization_error(&self) -> bool {
        matches!(
            self,
            WorkflowError::Unauthorized { .. }
                | WorkflowError::NotAssignedApprover { .. }
                | WorkflowError::OutsideSite { .. }
        )
    }
}
