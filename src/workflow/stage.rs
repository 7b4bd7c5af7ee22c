// Copyright 2025 Cowboy AI, LLC.

//! Per-initiative stage instances

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::StageDecision;
use super::definition::StageDefinition;
use super::state::StageStatus;
use crate::errors::{WorkflowError, WorkflowResult};
use crate::identifiers::{InitiativeId, StageInstanceId, UserId};
use crate::identity::ActingUser;
use crate::roles::Role;

/// One execution of one stage for one initiative
///
/// Created lazily as `pending` when its predecessor is approved. Once approved
/// or rejected it never changes again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStageInstance {
    id: StageInstanceId,
    initiative_id: InitiativeId,
    stage_number: u8,
    stage_name: String,
    required_role: Role,
    status: StageStatus,
    assigned_approver: Option<UserId>,
    comments: Option<String>,
    decision: Option<StageDecision>,
    approved_by: Option<UserId>,
    approved_by_name: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl WorkflowStageInstance {
    /// A new pending instance of `stage`
    pub fn pending(
        initiative_id: InitiativeId,
        stage: &StageDefinition,
        assigned_approver: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StageInstanceId::new(),
            initiative_id,
            stage_number: stage.number,
            stage_name: stage.name.clone(),
            required_role: stage.required_role,
            status: StageStatus::Pending,
            assigned_approver,
            comments: None,
            decision: None,
            approved_by: None,
            approved_by_name: None,
            approved_at: None,
            created_at: now,
        }
    }

    /// Instance ID
    pub fn id(&self) -> StageInstanceId {
        self.id
    }

    /// Owning initiative
    pub fn initiative_id(&self) -> InitiativeId {
        self.initiative_id
    }

    /// Stage number
    pub fn stage_number(&self) -> u8 {
        self.stage_number
    }

    /// Stage name at creation time
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Role required to act
    pub fn required_role(&self) -> Role {
        self.required_role
    }

    /// Status
    pub fn status(&self) -> StageStatus {
        self.status
    }

    /// Whether the instance still awaits a decision
    pub fn is_pending(&self) -> bool {
        self.status == StageStatus::Pending
    }

    /// The only user allowed to act, if the stage is assigned
    pub fn assigned_approver(&self) -> Option<UserId> {
        self.assigned_approver
    }

    /// Comment recorded with the decision
    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    /// Decision recorded on approval
    pub fn decision(&self) -> Option<&StageDecision> {
        self.decision.as_ref()
    }

    /// User who approved or rejected the stage
    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    /// Display name of the user who acted
    pub fn approved_by_name(&self) -> Option<&str> {
        self.approved_by_name.as_deref()
    }

    /// When the stage was approved or rejected
    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether `actor` may act on this instance of an initiative at `initiative_site`
    pub fn can_be_acted_on_by(&self, actor: &ActingUser, initiative_site: &str) -> bool {
        self.authorize(actor, initiative_site).is_ok()
    }

    /// Fail unless `actor` may act on this instance
    ///
    /// Checks the role capability, then the actor's site against the
    /// initiative's site, then the assigned approver.
    pub fn authorize(&self, actor: &ActingUser, initiative_site: &str) -> WorkflowResult<()> {
        if !actor.role.satisfies(self.required_role) {
            return Err(WorkflowError::Unauthorized {
                role: actor.role,
                required: self.required_role,
            });
        }
        if !actor.role.covers_site(&actor.site, initiative_site) {
            return Err(WorkflowError::OutsideSite {
                user_site: actor.site.clone(),
                initiative_site: initiative_site.to_string(),
            });
        }
        match self.assigned_approver {
            Some(assigned) if assigned != actor.id => Err(WorkflowError::NotAssignedApprover {
                stage_number: self.stage_number,
            }),
            _ => Ok(()),
        }
    }

    /// Fail with `StaleStageState` unless still pending
    pub fn ensure_pending(&self) -> WorkflowResult<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(WorkflowError::stale(format!(
                "stage {} instance {} is already {}",
                self.stage_number, self.id, self.status
            )))
        }
    }

    /// Mark approved with `decision`
    pub fn approve(
        &mut self,
        actor: &ActingUser,
        comment: &str,
        decision: StageDecision,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        self.ensure_pending()?;
        let comment = required_comment(comment)?;
        self.status = StageStatus::Approved;
        self.decision = Some(decision);
        self.record_actor(actor, comment, now);
        Ok(())
    }

    /// Mark rejected
    pub fn reject(
        &mut self,
        actor: &ActingUser,
        comment: &str,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        self.ensure_pending()?;
        let comment = required_comment(comment)?;
        self.status = StageStatus::Rejected;
        self.record_actor(actor, comment, now);
        Ok(())
    }

    fn record_actor(&mut self, actor: &ActingUser, comment: String, now: DateTime<Utc>) {
        self.comments = Some(comment);
        self.approved_by = Some(actor.id);
        self.approved_by_name = Some(actor.full_name.clone());
        self.approved_at = Some(now);
    }
}

/// Trimmed comment, or `ValidationError` when blank
pub fn required_comment(comment: &str) -> WorkflowResult<String> {
    let trimmed = comment.trim();
    if trimmed.is_empty() {
        Err(WorkflowError::validation("comment is required"))
    } else {
        Ok(trimmed.to_string())
    }
}
