// Copyright 2025 Cowboy AI, LLC.

//! The workflow engine
//!
//! Every command follows the same shape: take the initiative's lock, load a
//! fresh snapshot, validate, mutate copies, commit one [`TransitionBatch`],
//! then fan out notifications. Validation failures return before anything is
//! written, and the store rejects the batch if another writer got there first,
//! so a transition is either fully applied or not applied at all.
//!
//! ```mermaid
//! graph LR
//!     Cmd[command] --> Lock[per-initiative lock]
//!     Lock --> Load[load snapshot]
//!     Load --> Check[authorize + validate]
//!     Check --> Next[compute next stage]
//!     Next --> Commit[commit batch]
//!     Commit --> Notify[notify, best effort]
//! ```

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::commands::WorkflowCommand;
use super::decision::{DecisionPayload, StageDecision};
use super::definition::{StageDefinition, WorkflowDefinition};
use super::events::WorkflowEvent;
use super::initiative::{Initiative, NewInitiative, RegistrationLimits};
use super::stage::{required_comment, WorkflowStageInstance};
use super::state::WorkflowPosition;
use crate::config::EngineConfig;
use crate::entity::AggregateRoot;
use crate::errors::{WorkflowError, WorkflowResult};
use crate::identifiers::{InitiativeCode, InitiativeId, StageInstanceId, UserId};
use crate::identity::{ActingUser, UserDirectory};
use crate::notification::StageNotifier;
use crate::persistence::{TransitionBatch, WorkflowStore};
use crate::roles::Role;

const LOCK_TABLE_PRUNE_AT: usize = 1024;

/// Result of one engine command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Initiative after the command
    pub initiative: Initiative,
    /// The pending stage instance after the command, if any
    pub current_stage: Option<WorkflowStageInstance>,
    /// Events produced, in order
    pub events: Vec<WorkflowEvent>,
}

#[derive(Default)]
struct InitiativeLocks {
    table: Mutex<HashMap<InitiativeId, Arc<Mutex<()>>>>,
}

impl InitiativeLocks {
    async fn acquire(&self, id: InitiativeId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().await;
            if table.len() >= LOCK_TABLE_PRUNE_AT {
                table.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            table.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Drives initiatives through the stage table
///
/// The stage table is shared read-only. The engine keeps no other state
/// beyond the per-initiative locks that serialize writers.
pub struct WorkflowEngine<S, D, N> {
    definition: Arc<WorkflowDefinition>,
    limits: RegistrationLimits,
    store: S,
    directory: D,
    notifier: N,
    locks: InitiativeLocks,
}

impl<S, D, N> WorkflowEngine<S, D, N>
where
    S: WorkflowStore,
    D: UserDirectory,
    N: StageNotifier,
{
    /// Create an engine over `definition`
    pub fn new(definition: WorkflowDefinition, store: S, directory: D, notifier: N) -> Self {
        Self {
            definition: Arc::new(definition),
            limits: RegistrationLimits::default(),
            store,
            directory,
            notifier,
            locks: InitiativeLocks::default(),
        }
    }

    /// Create an engine from validated configuration
    pub fn from_config(config: &EngineConfig, store: S, directory: D, notifier: N) -> Self {
        Self {
            definition: Arc::new(config.workflow.clone()),
            limits: config.registration,
            store,
            directory,
            notifier,
            locks: InitiativeLocks::default(),
        }
    }

    /// Replace the registration limits
    pub fn with_limits(mut self, limits: RegistrationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The stage table
    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The user directory
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Run a serialized command
    pub async fn execute(
        &self,
        command: WorkflowCommand,
        actor: &ActingUser,
    ) -> WorkflowResult<TransitionOutcome> {
        debug!(command = command.name(), actor = %actor.id, "executing workflow command");
        match command {
            WorkflowCommand::Register { initiative } => self.register(initiative, actor).await,
            WorkflowCommand::Submit { initiative_id } => self.submit(initiative_id, actor).await,
            WorkflowCommand::Approve {
                stage_instance_id,
                comment,
                decision,
            } => self.approve(stage_instance_id, actor, &comment, decision).await,
            WorkflowCommand::Reject {
                stage_instance_id,
                comment,
            } => self.reject(stage_instance_id, actor, &comment).await,
            WorkflowCommand::Resubmit {
                initiative_id,
                comment,
            } => self.resubmit(initiative_id, actor, &comment).await,
        }
    }

    /// Register a draft initiative with a freshly issued code
    pub async fn register(
        &self,
        new: NewInitiative,
        actor: &ActingUser,
    ) -> WorkflowResult<TransitionOutcome> {
        new.validate(&self.limits)?;
        let now = Utc::now();

        let code = InitiativeCode::generate(&new.site, &new.discipline, &actor.full_name, actor.id, now)?;
        let sequence = self.store.next_code_sequence(&code.scope()).await?;
        let code = code.with_sequence(sequence)?;

        let initiative = Initiative::register(new, code, actor, now);
        self.store
            .commit(TransitionBatch::insert(initiative.clone()))
            .await?;

        info!(
            initiative_id = %initiative.id(),
            code = %initiative.code(),
            actor = %actor.id,
            "initiative registered"
        );

        let events = vec![WorkflowEvent::InitiativeRegistered {
            initiative_id: initiative.id(),
            code: initiative.code().clone(),
            site: initiative.site().to_string(),
            expected_savings: initiative.expected_savings,
            registered_by: actor.id,
            occurred_at: now,
        }];
        Ok(TransitionOutcome {
            initiative,
            current_stage: None,
            events,
        })
    }

    /// Move a draft into the workflow; the first stage becomes pending
    pub async fn submit(
        &self,
        initiative_id: InitiativeId,
        actor: &ActingUser,
    ) -> WorkflowResult<TransitionOutcome> {
        let _guard = self.locks.acquire(initiative_id).await;
        let mut initiative = self.require_initiative(initiative_id).await?;
        let first = self.definition.first_stage();
        ensure_owner_or_role(&initiative, actor, first.required_role)?;

        let expected = initiative.version();
        let now = Utc::now();
        initiative.submit(first.number, now)?;
        let pending = self.activate(&initiative, first, now).await?;
        initiative.increment_version();

        self.store
            .commit(TransitionBatch::update(
                initiative.clone(),
                expected,
                vec![pending.clone()],
            ))
            .await?;

        info!(
            initiative_id = %initiative_id,
            stage = first.number,
            actor = %actor.id,
            "initiative submitted"
        );

        let events = vec![WorkflowEvent::InitiativeSubmitted {
            initiative_id,
            stage_number: first.number,
            submitted_by: actor.id,
            occurred_at: now,
        }];
        self.publish(&events).await;
        Ok(TransitionOutcome {
            initiative,
            current_stage: Some(pending),
            events,
        })
    }

    /// Approve a pending stage and activate the next one
    pub async fn approve(
        &self,
        stage_instance_id: StageInstanceId,
        actor: &ActingUser,
        comment: &str,
        payload: DecisionPayload,
    ) -> WorkflowResult<TransitionOutcome> {
        let initiative_id = self.require_instance(stage_instance_id).await?.initiative_id();
        let _guard = self.locks.acquire(initiative_id).await;

        let mut instance = self.require_instance(stage_instance_id).await?;
        let mut initiative = self.require_initiative(initiative_id).await?;
        instance.ensure_pending()?;
        instance.authorize(actor, initiative.site())?;
        let comment = required_comment(comment)?;
        ensure_current(&initiative, &instance)?;

        let stage = self.definition.require_stage(instance.stage_number())?;
        let decision = payload.validate_for(stage.decision)?;
        if let StageDecision::AssignLead { user_id } = &decision {
            self.validate_assignee(&initiative, *user_id).await?;
        }

        let expected = initiative.version();
        let now = Utc::now();
        instance.approve(actor, &comment, decision.clone(), now)?;
        initiative.apply_decision(&decision);

        let advance = self
            .definition
            .advance(stage.number, &initiative.branch_flags());
        let next = match advance.next {
            Some(next_stage) => {
                let pending = self.activate(&initiative, next_stage, now).await?;
                initiative.advance_to(next_stage.number, now)?;
                Some(pending)
            }
            None => {
                initiative.close(now)?;
                None
            }
        };
        initiative.increment_version();

        let mut batch = vec![instance.clone()];
        batch.extend(next.iter().cloned());
        self.store
            .commit(TransitionBatch::update(initiative.clone(), expected, batch))
            .await?;

        info!(
            initiative_id = %initiative_id,
            stage = stage.number,
            next_stage = ?next.as_ref().map(|n| n.stage_number()),
            actor = %actor.id,
            "stage approved"
        );

        let mut events = vec![WorkflowEvent::StageApproved {
            initiative_id,
            stage_instance_id,
            stage_number: stage.number,
            decision,
            next_stage: next.as_ref().map(|n| n.stage_number()),
            approved_by: actor.id,
            occurred_at: now,
        }];
        for skipped in &advance.skipped {
            debug!(initiative_id = %initiative_id, stage = skipped, "stage skipped");
            events.push(WorkflowEvent::StageSkipped {
                initiative_id,
                stage_number: *skipped,
                occurred_at: now,
            });
        }
        if next.is_none() {
            info!(initiative_id = %initiative_id, "initiative closed");
            events.push(WorkflowEvent::InitiativeClosed {
                initiative_id,
                stage_number: stage.number,
                occurred_at: now,
            });
        }

        self.publish(&events).await;
        Ok(TransitionOutcome {
            initiative,
            current_stage: next,
            events,
        })
    }

    /// Reject a pending stage; the initiative waits for resubmission
    pub async fn reject(
        &self,
        stage_instance_id: StageInstanceId,
        actor: &ActingUser,
        comment: &str,
    ) -> WorkflowResult<TransitionOutcome> {
        let initiative_id = self.require_instance(stage_instance_id).await?.initiative_id();
        let _guard = self.locks.acquire(initiative_id).await;

        let mut instance = self.require_instance(stage_instance_id).await?;
        let mut initiative = self.require_initiative(initiative_id).await?;
        instance.ensure_pending()?;
        instance.authorize(actor, initiative.site())?;
        let comment = required_comment(comment)?;
        ensure_current(&initiative, &instance)?;

        let expected = initiative.version();
        let now = Utc::now();
        instance.reject(actor, &comment, now)?;
        initiative.reject(now)?;
        initiative.increment_version();

        self.store
            .commit(TransitionBatch::update(
                initiative.clone(),
                expected,
                vec![instance.clone()],
            ))
            .await?;

        info!(
            initiative_id = %initiative_id,
            stage = instance.stage_number(),
            actor = %actor.id,
            "stage rejected"
        );

        let events = vec![WorkflowEvent::StageRejected {
            initiative_id,
            stage_instance_id,
            stage_number: instance.stage_number(),
            rejected_by: actor.id,
            comment,
            occurred_at: now,
        }];
        self.publish(&events).await;
        Ok(TransitionOutcome {
            initiative,
            current_stage: None,
            events,
        })
    }

    /// Re-enter the workflow at the first stage after a rejection
    ///
    /// Decisions recorded in the rejected cycle are cleared; earlier stage
    /// instances stay in the history.
    pub async fn resubmit(
        &self,
        initiative_id: InitiativeId,
        actor: &ActingUser,
        comment: &str,
    ) -> WorkflowResult<TransitionOutcome> {
        let _guard = self.locks.acquire(initiative_id).await;
        let mut initiative = self.require_initiative(initiative_id).await?;
        let first = self.definition.first_stage();
        ensure_owner_or_role(&initiative, actor, Role::InitLead)?;
        let comment = required_comment(comment)?;

        let expected = initiative.version();
        let now = Utc::now();
        initiative.resubmit(first.number, now)?;
        let pending = self.activate(&initiative, first, now).await?;
        initiative.increment_version();

        self.store
            .commit(TransitionBatch::update(
                initiative.clone(),
                expected,
                vec![pending.clone()],
            ))
            .await?;

        info!(
            initiative_id = %initiative_id,
            stage = first.number,
            actor = %actor.id,
            "initiative resubmitted"
        );

        let events = vec![WorkflowEvent::InitiativeResubmitted {
            initiative_id,
            stage_number: first.number,
            resubmitted_by: actor.id,
            comment,
            occurred_at: now,
        }];
        self.publish(&events).await;
        Ok(TransitionOutcome {
            initiative,
            current_stage: Some(pending),
            events,
        })
    }

    pub(crate) async fn require_initiative(&self, id: InitiativeId) -> WorkflowResult<Initiative> {
        self.store
            .load_initiative(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Initiative", id))
    }

    async fn require_instance(&self, id: StageInstanceId) -> WorkflowResult<WorkflowStageInstance> {
        self.store
            .load_stage_instance(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("WorkflowStageInstance", id))
    }

    /// Build the pending instance for `stage`, failing when nobody could act on it
    async fn activate(
        &self,
        initiative: &Initiative,
        stage: &StageDefinition,
        now: chrono::DateTime<Utc>,
    ) -> WorkflowResult<WorkflowStageInstance> {
        let assigned = match stage.required_role {
            Role::InitLead => initiative.assigned_lead(),
            _ => None,
        };

        let eligible = match assigned {
            Some(lead) => self
                .directory
                .find_user(lead)
                .await?
                .is_some_and(|user| {
                    user.role.satisfies(stage.required_role)
                        && user.role.covers_site(&user.site, initiative.site())
                }),
            None => !self
                .directory
                .eligible_users(stage.required_role, initiative.site())
                .await?
                .is_empty(),
        };
        if !eligible {
            warn!(
                initiative_id = %initiative.id(),
                stage = stage.number,
                role = %stage.required_role,
                site = initiative.site(),
                "no eligible approver for next stage"
            );
            return Err(WorkflowError::NoEligibleApprover {
                role: stage.required_role,
                site: initiative.site().to_string(),
            });
        }

        Ok(WorkflowStageInstance::pending(
            initiative.id(),
            stage,
            assigned,
            now,
        ))
    }

    async fn validate_assignee(&self, initiative: &Initiative, user_id: UserId) -> WorkflowResult<()> {
        let leads = self
            .directory
            .eligible_users(Role::InitLead, initiative.site())
            .await?;
        if leads.is_empty() {
            return Err(WorkflowError::NoEligibleApprover {
                role: Role::InitLead,
                site: initiative.site().to_string(),
            });
        }

        let user = self
            .directory
            .find_user(user_id)
            .await?
            .ok_or_else(|| WorkflowError::validation(format!("assigned user {user_id} does not exist")))?;
        if user.role != Role::InitLead {
            return Err(WorkflowError::validation(format!(
                "assigned user {user_id} has role {}, expected {}",
                user.role,
                Role::InitLead
            )));
        }
        if !user.site.eq_ignore_ascii_case(initiative.site()) {
            return Err(WorkflowError::validation(format!(
                "assigned user {user_id} belongs to site {}, not {}",
                user.site,
                initiative.site()
            )));
        }
        Ok(())
    }

    async fn publish(&self, events: &[WorkflowEvent]) {
        for notification in events.iter().filter_map(WorkflowEvent::notification) {
            if let Err(e) = self.notifier.notify(&notification).await {
                warn!(
                    initiative_id = %notification.initiative_id,
                    stage = notification.stage_number,
                    event = %notification.event,
                    error = %e,
                    "notification failed"
                );
            }
        }
    }
}

fn ensure_owner_or_role(initiative: &Initiative, actor: &ActingUser, role: Role) -> WorkflowResult<()> {
    if initiative.created_by() == actor.id {
        return Ok(());
    }
    if !actor.role.satisfies(role) {
        return Err(WorkflowError::Unauthorized {
            role: actor.role,
            required: role,
        });
    }
    if !actor.role.covers_site(&actor.site, initiative.site()) {
        return Err(WorkflowError::OutsideSite {
            user_site: actor.site.clone(),
            initiative_site: initiative.site().to_string(),
        });
    }
    Ok(())
}

/// The instance must be the initiative's current stage of an active cycle
fn ensure_current(initiative: &Initiative, instance: &WorkflowStageInstance) -> WorkflowResult<()> {
    match initiative.position() {
        WorkflowPosition::AtStage(stage) if stage == instance.stage_number() => Ok(()),
        position => Err(WorkflowError::stale(format!(
            "initiative {} is at {position:?}, not at stage {}",
            initiative.id(),
            instance.stage_number()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{InMemoryUserDirectory, User};
    use crate::money::Money;
    use crate::notification::{NotificationKind, RecordingNotifier};
    use crate::persistence::InMemoryWorkflowStore;
    use crate::workflow::{InitiativeStatus, StageStatus};

    type Engine = WorkflowEngine<InMemoryWorkflowStore, InMemoryUserDirectory, RecordingNotifier>;

    fn users() -> Vec<User> {
        vec![
            User::new(1, "Anil Bansal", "anil@example.com", "NDS", "OP", Role::InitLead),
            User::new(2, "Priya Shah", "priya@example.com", "NDS", "OP", Role::Approver),
            User::new(3, "Vikram Gupta", "vikram@example.com", "NDS", "OP", Role::SiteTsoLead),
            User::new(4, "Kavya Nair", "kavya@example.com", "NDS", "OP", Role::CorpTso),
        ]
    }

    fn engine() -> Engine {
        WorkflowEngine::new(
            WorkflowDefinition::standard(),
            InMemoryWorkflowStore::new(),
            InMemoryUserDirectory::with_users(users()),
            RecordingNotifier::new(),
        )
    }

    fn acting(id: u64) -> ActingUser {
        users()
            .into_iter()
            .find(|u| u.id == UserId(id))
            .map(|u| u.acting())
            .unwrap()
    }

    async fn submitted(engine: &Engine) -> TransitionOutcome {
        let registered = engine
            .register(
                NewInitiative::new("Reduce steam losses", "NDS", "OP", Money::from_major(50_000)),
                &acting(1),
            )
            .await
            .unwrap();
        engine
            .submit(registered.initiative.id(), &acting(1))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_issues_sequential_codes() {
        let engine = engine();
        let first = engine
            .register(NewInitiative::new("A", "nds", "op", Money::ZERO), &acting(1))
            .await
            .unwrap();
        let second = engine
            .register(NewInitiative::new("B", "NDS", "OP", Money::ZERO), &acting(1))
            .await
            .unwrap();

        assert_eq!(first.initiative.code().sequence(), 1);
        assert_eq!(second.initiative.code().sequence(), 2);
        assert_eq!(first.initiative.code().initiator(), "AB");
        assert_eq!(first.initiative.status(), InitiativeStatus::Draft);
        assert!(first.current_stage.is_none());
    }

    #[tokio::test]
    async fn test_register_never_burns_sequence_numbers() {
        let engine = engine();
        let li_ming = ActingUser {
            id: UserId(88),
            full_name: "李 明".to_string(),
            role: Role::InitLead,
            site: "NDS".to_string(),
        };

        let err = engine
            .register(NewInitiative::new("A", "N-DS", "OP", Money::ZERO), &acting(1))
            .await
            .unwrap_err();
        assert!(err.is_validation_error());

        let first = engine
            .register(NewInitiative::new("B", "NDS", "OP", Money::ZERO), &li_ming)
            .await
            .unwrap();
        let second = engine
            .register(NewInitiative::new("C", "NDS", "OP", Money::ZERO), &acting(1))
            .await
            .unwrap();

        assert_eq!(first.initiative.code().initiator(), "U88");
        assert_eq!(first.initiative.code().sequence(), 1);
        assert_eq!(second.initiative.code().sequence(), 2);
    }

    #[tokio::test]
    async fn test_submit_creates_pending_first_stage() {
        let engine = engine();
        let outcome = submitted(&engine).await;
        let pending = outcome.current_stage.unwrap();

        assert_eq!(outcome.initiative.status(), InitiativeStatus::InProgress);
        assert_eq!(pending.stage_number(), 1);
        assert_eq!(pending.status(), StageStatus::Pending);

        let err = engine
            .submit(outcome.initiative.id(), &acting(1))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_submit_by_stranger_is_unauthorized() {
        let engine = engine();
        let registered = engine
            .register(NewInitiative::new("A", "NDS", "OP", Money::ZERO), &acting(1))
            .await
            .unwrap();
        let err = engine
            .submit(registered.initiative.id(), &acting(2))
            .await
            .unwrap_err();
        assert!(err.is_authorization_error());
    }

    #[tokio::test]
    async fn test_approve_moves_to_next_stage_and_notifies() {
        let engine = engine();
        let outcome = submitted(&engine).await;
        let stage1 = outcome.current_stage.unwrap();

        let approved = engine
            .approve(stage1.id(), &acting(1), "registered", DecisionPayload::none())
            .await
            .unwrap();
        assert_eq!(approved.initiative.current_stage(), 2);
        assert_eq!(approved.current_stage.unwrap().stage_number(), 2);

        let sent = engine.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event, NotificationKind::Approved);
        assert_eq!(sent[0].stage_number, 1);
    }

    #[tokio::test]
    async fn test_reject_has_no_successor_and_resubmit_restarts() {
        let engine = engine();
        let outcome = submitted(&engine).await;
        let id = outcome.initiative.id();
        let stage1 = outcome.current_stage.unwrap();
        let stage2 = engine
            .approve(stage1.id(), &acting(1), "ok", DecisionPayload::none())
            .await
            .unwrap()
            .current_stage
            .unwrap();

        let rejected = engine.reject(stage2.id(), &acting(2), "needs data").await.unwrap();
        assert_eq!(rejected.initiative.status(), InitiativeStatus::Rejected);
        assert!(rejected.current_stage.is_none());
        assert!(engine
            .store()
            .load_pending_stage_instances()
            .await
            .unwrap()
            .is_empty());

        assert!(engine
            .resubmit(id, &acting(1), " ")
            .await
            .unwrap_err()
            .is_validation_error());

        let resubmitted = engine.resubmit(id, &acting(1), "added data").await.unwrap();
        assert_eq!(resubmitted.initiative.status(), InitiativeStatus::InProgress);
        assert_eq!(resubmitted.current_stage.unwrap().stage_number(), 1);
        assert_eq!(engine.store().load_stage_instances(id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_stage_instance_is_not_found() {
        let engine = engine();
        let err = engine
            .approve(StageInstanceId::new(), &acting(1), "ok", DecisionPayload::none())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
