// Copyright 2025 Cowboy AI, LLC.

//! The initiative aggregate
//!
//! An initiative is mutated only through stage transitions driven by the
//! engine. Each mutation goes through a lifecycle check on
//! [`InitiativeStatus`] so an illegal move surfaces as
//! `InvalidStateTransition` before anything is persisted.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::decision::StageDecision;
use super::definition::BranchFlags;
use super::state::{InitiativeStatus, WorkflowPosition};
use crate::entity::AggregateRoot;
use crate::errors::{WorkflowError, WorkflowResult};
use crate::identifiers::{InitiativeCode, InitiativeId, UserId};
use crate::identity::ActingUser;
use crate::money::Money;

/// Initiative priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Priority {
    /// High
    High,
    /// Medium
    #[default]
    Medium,
    /// Low
    Low,
}

/// Field limits applied when registering an initiative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationLimits {
    /// Maximum title length in characters
    pub max_title_len: usize,
    /// Maximum site and discipline length in characters
    pub max_segment_len: usize,
}

impl Default for RegistrationLimits {
    fn default() -> Self {
        Self {
            max_title_len: 200,
            max_segment_len: 10,
        }
    }
}

/// Registration input for a new initiative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewInitiative {
    /// Title
    pub title: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Site code, e.g. `NDS`
    pub site: String,
    /// Discipline code, e.g. `OP`
    pub discipline: String,
    /// Priority
    #[serde(default)]
    pub priority: Priority,
    /// Expected annual savings
    pub expected_savings: Money,
}

impl NewInitiative {
    /// Registration input with default priority and no description
    pub fn new(
        title: impl Into<String>,
        site: impl Into<String>,
        discipline: impl Into<String>,
        expected_savings: Money,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            site: site.into(),
            discipline: discipline.into(),
            priority: Priority::default(),
            expected_savings,
        }
    }

    /// Check required fields against `limits`
    pub fn validate(&self, limits: &RegistrationLimits) -> WorkflowResult<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(WorkflowError::validation("title is required"));
        }
        if title.chars().count() > limits.max_title_len {
            return Err(WorkflowError::validation(format!(
                "title must be at most {} characters",
                limits.max_title_len
            )));
        }
        for (field, value) in [("site", &self.site), ("discipline", &self.discipline)] {
            let value = value.trim();
            if value.is_empty() {
                return Err(WorkflowError::validation(format!("{field} is required")));
            }
            if value.chars().count() > limits.max_segment_len {
                return Err(WorkflowError::validation(format!(
                    "{field} must be at most {} characters",
                    limits.max_segment_len
                )));
            }
            if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(WorkflowError::validation(format!(
                    "{field} must be alphanumeric"
                )));
            }
        }
        if self.expected_savings.is_negative() {
            return Err(WorkflowError::validation("expected savings cannot be negative"));
        }
        Ok(())
    }
}

/// A tracked improvement initiative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiative {
    id: InitiativeId,
    code: InitiativeCode,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    site: String,
    discipline: String,
    /// Priority
    pub priority: Priority,
    /// Expected savings
    pub expected_savings: Money,
    status: InitiativeStatus,
    current_stage: u8,
    requires_moc: Option<bool>,
    moc_number: Option<String>,
    requires_capex: Option<bool>,
    capex_number: Option<String>,
    assigned_lead: Option<UserId>,
    created_by: UserId,
    created_by_name: String,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    version: u64,
}

impl Initiative {
    /// Build a draft from validated registration input
    pub fn register(
        new: NewInitiative,
        code: InitiativeCode,
        creator: &ActingUser,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InitiativeId::new(),
            title: new.title.trim().to_string(),
            description: new.description,
            site: code.site().to_string(),
            discipline: code.discipline().to_string(),
            code,
            priority: new.priority,
            expected_savings: new.expected_savings,
            status: InitiativeStatus::Draft,
            current_stage: 1,
            requires_moc: None,
            moc_number: None,
            requires_capex: None,
            capex_number: None,
            assigned_lead: None,
            created_by: creator.id,
            created_by_name: creator.full_name.clone(),
            created_at: now,
            last_updated: now,
            version: 0,
        }
    }

    /// Human-facing code
    pub fn code(&self) -> &InitiativeCode {
        &self.code
    }

    /// Site code
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Discipline code
    pub fn discipline(&self) -> &str {
        &self.discipline
    }

    /// Lifecycle status
    pub fn status(&self) -> InitiativeStatus {
        self.status
    }

    /// Number of the current (or last reached) stage
    pub fn current_stage(&self) -> u8 {
        self.current_stage
    }

    /// MOC decision, `None` until the MOC decision stage is approved
    pub fn requires_moc(&self) -> Option<bool> {
        self.requires_moc
    }

    /// MOC reference
    pub fn moc_number(&self) -> Option<&str> {
        self.moc_number.as_deref()
    }

    /// CAPEX decision, `None` until the CAPEX decision stage is approved
    pub fn requires_capex(&self) -> Option<bool> {
        self.requires_capex
    }

    /// CAPEX reference
    pub fn capex_number(&self) -> Option<&str> {
        self.capex_number.as_deref()
    }

    /// Initiative Lead assigned at the responsibilities stage
    pub fn assigned_lead(&self) -> Option<UserId> {
        self.assigned_lead
    }

    /// Creator
    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    /// Creator's display name
    pub fn created_by_name(&self) -> &str {
        &self.created_by_name
    }

    /// Registration time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last transition
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Decided branch flags
    pub fn branch_flags(&self) -> BranchFlags {
        BranchFlags {
            requires_moc: self.requires_moc,
            requires_capex: self.requires_capex,
        }
    }

    /// Position in the workflow state machine
    pub fn position(&self) -> WorkflowPosition {
        match self.status {
            InitiativeStatus::Draft => WorkflowPosition::NotSubmitted,
            InitiativeStatus::InProgress => WorkflowPosition::AtStage(self.current_stage),
            InitiativeStatus::Closed => WorkflowPosition::Closed,
            InitiativeStatus::Rejected => WorkflowPosition::Rejected(self.current_stage),
        }
    }

    /// Enter the workflow at `first_stage`
    pub fn submit(&mut self, first_stage: u8, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.status = self.status.transition_to(InitiativeStatus::InProgress)?;
        self.current_stage = first_stage;
        self.last_updated = now;
        Ok(())
    }

    /// Record the decision of an approved stage
    pub fn apply_decision(&mut self, decision: &StageDecision) {
        match decision {
            StageDecision::None => {}
            StageDecision::AssignLead { user_id } => self.assigned_lead = Some(*user_id),
            StageDecision::Moc { required, number } => {
                self.requires_moc = Some(*required);
                self.moc_number = number.clone();
            }
            StageDecision::Capex { required, number } => {
                self.requires_capex = Some(*required);
                self.capex_number = number.clone();
            }
        }
    }

    /// Move the current stage forward
    pub fn advance_to(&mut self, stage: u8, now: DateTime<Utc>) -> WorkflowResult<()> {
        if self.status != InitiativeStatus::InProgress {
            return Err(WorkflowError::InvalidStateTransition {
                from: self.status.to_string(),
                to: format!("stage {stage}"),
            });
        }
        if stage <= self.current_stage {
            return Err(WorkflowError::stale(format!(
                "initiative is already at stage {}",
                self.current_stage
            )));
        }
        self.current_stage = stage;
        self.last_updated = now;
        Ok(())
    }

    /// Complete the workflow
    pub fn close(&mut self, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.status = self.status.transition_to(InitiativeStatus::Closed)?;
        self.last_updated = now;
        Ok(())
    }

    /// Return the initiative to its submitter
    pub fn reject(&mut self, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.status = self.status.transition_to(InitiativeStatus::Rejected)?;
        self.last_updated = now;
        Ok(())
    }

    /// Re-enter the workflow at `first_stage` with every decision cleared
    pub fn resubmit(&mut self, first_stage: u8, now: DateTime<Utc>) -> WorkflowResult<()> {
        if self.status != InitiativeStatus::Rejected {
            return Err(WorkflowError::InvalidStateTransition {
                from: self.status.to_string(),
                to: InitiativeStatus::InProgress.to_string(),
            });
        }
        self.status = InitiativeStatus::InProgress;
        self.current_stage = first_stage;
        self.requires_moc = None;
        self.moc_number = None;
        self.requires_capex = None;
        self.capex_number = None;
        self.assigned_lead = None;
        self.last_updated = now;
        Ok(())
    }
}

impl AggregateRoot for Initiative {
    type Id = InitiativeId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn increment_version(&mut self) {
        self.version += 1;
    }
}
