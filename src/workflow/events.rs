// Copyright 2025 Cowboy AI, LLC.

//! Workflow domain events
//!
//! Every engine command returns the events it produced, in order. Events are
//! facts: they are emitted only after the transition has been committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::StageDecision;
use crate::identifiers::{InitiativeCode, InitiativeId, StageInstanceId, UserId};
use crate::money::Money;
use crate::notification::{NotificationKind, WorkflowNotification};

/// Base trait for domain events
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Get the aggregate ID this event relates to
    fn aggregate_id(&self) -> Uuid;

    /// Get the event type name
    fn event_type(&self) -> &'static str;

    /// Get the schema version
    fn version(&self) -> &'static str {
        "v1"
    }
}

/// Events raised by workflow transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkflowEvent {
    /// A draft initiative was registered
    InitiativeRegistered {
        /// Initiative
        initiative_id: InitiativeId,
        /// Generated code
        code: InitiativeCode,
        /// Site code
        site: String,
        /// Expected savings at registration
        expected_savings: Money,
        /// Creator
        registered_by: UserId,
        /// When
        occurred_at: DateTime<Utc>,
    },

    /// A draft entered the workflow
    InitiativeSubmitted {
        /// Initiative
        initiative_id: InitiativeId,
        /// First pending stage
        stage_number: u8,
        /// Submitter
        submitted_by: UserId,
        /// When
        occurred_at: DateTime<Utc>,
    },

    /// A stage instance was approved
    StageApproved {
        /// Initiative
        initiative_id: InitiativeId,
        /// Approved instance
        stage_instance_id: StageInstanceId,
        /// Approved stage
        stage_number: u8,
        /// Recorded decision
        decision: StageDecision,
        /// Stage activated next, `None` when the workflow completed
        next_stage: Option<u8>,
        /// Approver
        approved_by: UserId,
        /// When
        occurred_at: DateTime<Utc>,
    },

    /// A conditional stage was passed over
    StageSkipped {
        /// Initiative
        initiative_id: InitiativeId,
        /// Skipped stage
        stage_number: u8,
        /// When
        occurred_at: DateTime<Utc>,
    },

    /// A stage instance was rejected
    StageRejected {
        /// Initiative
        initiative_id: InitiativeId,
        /// Rejected instance
        stage_instance_id: StageInstanceId,
        /// Rejected stage
        stage_number: u8,
        /// Rejecting user
        rejected_by: UserId,
        /// Rejection comment
        comment: String,
        /// When
        occurred_at: DateTime<Utc>,
    },

    /// The final stage was approved
    InitiativeClosed {
        /// Initiative
        initiative_id: InitiativeId,
        /// Final stage number
        stage_number: u8,
        /// When
        occurred_at: DateTime<Utc>,
    },

    /// A rejected initiative re-entered the workflow
    InitiativeResubmitted {
        /// Initiative
        initiative_id: InitiativeId,
        /// First pending stage
        stage_number: u8,
        /// Resubmitting user
        resubmitted_by: UserId,
        /// Resubmission comment
        comment: String,
        /// When
        occurred_at: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    /// Initiative the event concerns
    pub fn initiative_id(&self) -> InitiativeId {
        match self {
            WorkflowEvent::InitiativeRegistered { initiative_id, .. }
            | WorkflowEvent::InitiativeSubmitted { initiative_id, .. }
            | WorkflowEvent::StageApproved { initiative_id, .. }
            | WorkflowEvent::StageSkipped { initiative_id, .. }
            | WorkflowEvent::StageRejected { initiative_id, .. }
            | WorkflowEvent::InitiativeClosed { initiative_id, .. }
            | WorkflowEvent::InitiativeResubmitted { initiative_id, .. } => *initiative_id,
        }
    }

    /// When the event occurred
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WorkflowEvent::InitiativeRegistered { occurred_at, .. }
            | WorkflowEvent::InitiativeSubmitted { occurred_at, .. }
            | WorkflowEvent::StageApproved { occurred_at, .. }
            | WorkflowEvent::StageSkipped { occurred_at, .. }
            | WorkflowEvent::StageRejected { occurred_at, .. }
            | WorkflowEvent::InitiativeClosed { occurred_at, .. }
            | WorkflowEvent::InitiativeResubmitted { occurred_at, .. } => *occurred_at,
        }
    }

    /// The downstream notification this event fans out to, if any
    pub fn notification(&self) -> Option<WorkflowNotification> {
        let (kind, initiative_id, stage_number) = match self {
            WorkflowEvent::StageApproved {
                initiative_id,
                stage_number,
                ..
            } => (NotificationKind::Approved, initiative_id, stage_number),
            WorkflowEvent::StageRejected {
                initiative_id,
                stage_number,
                ..
            } => (NotificationKind::Rejected, initiative_id, stage_number),
            WorkflowEvent::InitiativeClosed {
                initiative_id,
                stage_number,
                ..
            } => (NotificationKind::Closed, initiative_id, stage_number),
            _ => return None,
        };
        Some(WorkflowNotification {
            event: kind,
            initiative_id: *initiative_id,
            stage_number: *stage_number,
        })
    }
}

impl DomainEvent for WorkflowEvent {
    fn aggregate_id(&self) -> Uuid {
        *self.initiative_id().as_uuid()
    }

    fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::InitiativeRegistered { .. } => "InitiativeRegistered",
            WorkflowEvent::InitiativeSubmitted { .. } => "InitiativeSubmitted",
            WorkflowEvent::StageApproved { .. } => "StageApproved",
            WorkflowEvent::StageSkipped { .. } => "StageSkipped",
            WorkflowEvent::StageRejected { .. } => "StageRejected",
            WorkflowEvent::InitiativeClosed { .. } => "InitiativeClosed",
            WorkflowEvent::InitiativeResubmitted { .. } => "InitiativeResubmitted",
        }
    }
}
