// Copyright 2025 Cowboy AI, LLC.

//! Read-side queries over the workflow
//!
//! Queries never take the per-initiative write lock. They read whatever the
//! store last committed, so each instance is seen either before or after a
//! transition, never in between.

use std::collections::HashMap;

use super::engine::WorkflowEngine;
use super::stage::WorkflowStageInstance;
use super::state::{InitiativeStatus, StageStatus};
use crate::entity::AggregateRoot;
use crate::errors::{WorkflowError, WorkflowResult};
use crate::identifiers::{InitiativeId, UserId};
use crate::identity::{User, UserDirectory};
use crate::notification::StageNotifier;
use crate::persistence::WorkflowStore;

impl<S, D, N> WorkflowEngine<S, D, N>
where
    S: WorkflowStore,
    D: UserDirectory,
    N: StageNotifier,
{
    /// Stage history of an initiative, by stage number then creation time
    pub async fn workflow_stages(
        &self,
        initiative_id: InitiativeId,
    ) -> WorkflowResult<Vec<WorkflowStageInstance>> {
        self.require_initiative(initiative_id).await?;
        let mut stages = self.store().load_stage_instances(initiative_id).await?;
        stages.sort_by_key(|s| (s.stage_number(), s.created_at()));
        Ok(stages)
    }

    /// The single pending instance of an initiative, if any
    pub async fn current_stage(
        &self,
        initiative_id: InitiativeId,
    ) -> WorkflowResult<Option<WorkflowStageInstance>> {
        self.require_initiative(initiative_id).await?;
        Ok(self
            .store()
            .load_stage_instances(initiative_id)
            .await?
            .into_iter()
            .find(WorkflowStageInstance::is_pending))
    }

    /// Pending instances `user_id` may act on, oldest first
    ///
    /// Site-scoped roles only see initiatives at the user's own site.
    pub async fn pending_approvals(
        &self,
        user_id: UserId,
    ) -> WorkflowResult<Vec<WorkflowStageInstance>> {
        let user = self.require_user(user_id).await?.acting();
        let sites = self.initiative_sites().await?;
        let mut pending: Vec<_> = self
            .store()
            .load_pending_stage_instances()
            .await?
            .into_iter()
            .filter(|s| {
                sites
                    .get(&s.initiative_id())
                    .is_some_and(|site| s.can_be_acted_on_by(&user, site))
            })
            .collect();
        pending.sort_by_key(|s| s.created_at());
        Ok(pending)
    }

    /// [`Self::pending_approvals`] restricted to initiatives at `site`
    pub async fn pending_approvals_at_site(
        &self,
        user_id: UserId,
        site: &str,
    ) -> WorkflowResult<Vec<WorkflowStageInstance>> {
        let pending = self.pending_approvals(user_id).await?;
        let sites = self.initiative_sites().await?;
        Ok(pending
            .into_iter()
            .filter(|s| {
                sites
                    .get(&s.initiative_id())
                    .is_some_and(|s| s.eq_ignore_ascii_case(site))
            })
            .collect())
    }

    /// Completion percentage of the current cycle
    ///
    /// Approved active stages times 100 over the number of active stages.
    /// Conditional stages whose flag is already decided false are not
    /// counted. A closed initiative is always at 100.
    pub async fn progress(&self, initiative_id: InitiativeId) -> WorkflowResult<u8> {
        let initiative = self.require_initiative(initiative_id).await?;
        match initiative.status() {
            InitiativeStatus::Closed => return Ok(100),
            InitiativeStatus::Draft => return Ok(0),
            InitiativeStatus::InProgress | InitiativeStatus::Rejected => {}
        }

        let flags = initiative.branch_flags();
        let active = self.definition().active_stage_count(&flags);
        if active == 0 {
            return Ok(0);
        }

        let instances = self.store().load_stage_instances(initiative_id).await?;
        let first = self.definition().first_stage().number;
        let cycle_start = instances
            .iter()
            .filter(|s| s.stage_number() == first)
            .map(|s| s.created_at())
            .max();

        let approved = instances
            .iter()
            .filter(|s| s.status() == StageStatus::Approved)
            .filter(|s| cycle_start.map_or(true, |start| s.created_at() >= start))
            .filter(|s| {
                self.definition()
                    .stage(s.stage_number())
                    .is_some_and(|d| d.is_active(&flags))
            })
            .count();

        Ok(((approved.min(active) * 100) / active) as u8)
    }

    async fn initiative_sites(&self) -> WorkflowResult<HashMap<InitiativeId, String>> {
        Ok(self
            .store()
            .load_initiatives()
            .await?
            .into_iter()
            .map(|i| (i.id(), i.site().to_string()))
            .collect())
    }

    async fn require_user(&self, id: UserId) -> WorkflowResult<User> {
        self.directory()
            .find_user(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("User", id))
    }
}
