// Copyright 2025 Cowboy AI, LLC.

//! Shared fixtures for workflow integration tests
#![allow(dead_code)]

use opex_workflow::{
    ActingUser, DecisionKind, DecisionPayload, InMemoryUserDirectory, InMemoryWorkflowStore,
    InitiativeId, Money, NewInitiative, RecordingNotifier, Role, StageDefinition, StageNotifier,
    User, UserId, WorkflowDefinition, WorkflowEngine, WorkflowStageInstance,
};

pub type TestEngine<N = RecordingNotifier> =
    WorkflowEngine<InMemoryWorkflowStore, InMemoryUserDirectory, N>;

pub const LEAD: u64 = 1;
pub const APPROVER: u64 = 2;
pub const SITE_TSO: u64 = 3;
pub const CORP_TSO: u64 = 4;
pub const OTHER_LEAD: u64 = 5;
pub const NOT_A_LEAD: u64 = 42;
pub const REMOTE_LEAD: u64 = 7;
pub const REMOTE_TSO: u64 = 8;

pub fn users() -> Vec<User> {
    vec![
        User::new(LEAD, "Anil Bansal", "anil@example.com", "NDS", "OP", Role::InitLead),
        User::new(APPROVER, "Priya Shah", "priya@example.com", "NDS", "OP", Role::Approver),
        User::new(SITE_TSO, "Vikram Gupta", "vikram@example.com", "NDS", "MAINT", Role::SiteTsoLead),
        User::new(CORP_TSO, "Kavya Nair", "kavya@example.com", "CORP", "EV", Role::CorpTso),
        User::new(OTHER_LEAD, "Deepika Singh", "deepika@example.com", "NDS", "OP", Role::InitLead),
        User::new(NOT_A_LEAD, "Rohan Mehta", "rohan@example.com", "NDS", "OP", Role::Approver),
        User::new(REMOTE_LEAD, "Ravi Rao", "ravi@example.com", "HSD1", "OP", Role::InitLead),
        User::new(REMOTE_TSO, "Meera Iyer", "meera@example.com", "HSD1", "MAINT", Role::SiteTsoLead),
    ]
}

pub fn actor(id: u64) -> ActingUser {
    users()
        .into_iter()
        .find(|u| u.id == UserId(id))
        .map(|u| u.acting())
        .expect("fixture user")
}

/// A fixture user able to act on a stage requiring `role`
pub fn actor_for(role: Role) -> ActingUser {
    match role {
        Role::InitLead => actor(LEAD),
        Role::Approver => actor(APPROVER),
        Role::SiteTsoLead | Role::SiteCorpTso => actor(SITE_TSO),
        Role::CorpTso => actor(CORP_TSO),
        Role::SiteTsdLead => panic!("no stage requires SITE_TSD_LEAD"),
    }
}

/// A fixture user whose role cannot act on a stage requiring `role`
pub fn wrong_actor_for(role: Role) -> ActingUser {
    match role {
        Role::Approver => actor(LEAD),
        _ => actor(APPROVER),
    }
}

pub fn engine() -> TestEngine {
    engine_with(RecordingNotifier::new())
}

pub fn engine_with<N: StageNotifier>(notifier: N) -> TestEngine<N> {
    WorkflowEngine::new(
        WorkflowDefinition::standard(),
        InMemoryWorkflowStore::new(),
        InMemoryUserDirectory::with_users(users()),
        notifier,
    )
}

/// Branch answers used when walking the pipeline
#[derive(Debug, Clone, Copy)]
pub struct Branches {
    pub moc: bool,
    pub capex: bool,
}

impl Branches {
    pub const NONE: Branches = Branches {
        moc: false,
        capex: false,
    };
    pub const ALL: Branches = Branches {
        moc: true,
        capex: true,
    };
}

pub fn payload_for(stage: &StageDefinition, branches: Branches) -> DecisionPayload {
    match stage.decision {
        None => DecisionPayload::none(),
        Some(DecisionKind::AssignResponsibilities) => DecisionPayload::assign(LEAD),
        Some(DecisionKind::MocRequirement) => {
            DecisionPayload::moc(branches.moc, branches.moc.then_some("MOC-2025-014"))
        }
        Some(DecisionKind::CapexRequirement) => {
            DecisionPayload::capex(branches.capex, branches.capex.then_some("CAPEX-77"))
        }
    }
}

/// Register and submit an initiative at NDS; returns the pending stage-1 instance
pub async fn start<N: StageNotifier>(engine: &TestEngine<N>) -> (InitiativeId, WorkflowStageInstance) {
    use opex_workflow::AggregateRoot;

    let draft = engine
        .register(
            NewInitiative::new("Reduce steam losses", "NDS", "OP", Money::from_major(125_000)),
            &actor(LEAD),
        )
        .await
        .expect("register");
    let id = draft.initiative.id();
    let submitted = engine.submit(id, &actor(LEAD)).await.expect("submit");
    (id, submitted.current_stage.expect("stage 1 pending"))
}

/// Approve `pending` with the fixture actor and payload for its stage
pub async fn approve_stage<N: StageNotifier>(
    engine: &TestEngine<N>,
    pending: &WorkflowStageInstance,
    branches: Branches,
) -> Option<WorkflowStageInstance> {
    let stage = engine
        .definition()
        .stage(pending.stage_number())
        .expect("defined stage")
        .clone();
    engine
        .approve(
            pending.id(),
            &actor_for(stage.required_role),
            &format!("stage {} done", stage.number),
            payload_for(&stage, branches),
        )
        .await
        .expect("approve")
        .current_stage
}

/// Start an initiative and approve stages until `target` is pending
pub async fn walk_to<N: StageNotifier>(
    engine: &TestEngine<N>,
    branches: Branches,
    target: u8,
) -> (InitiativeId, WorkflowStageInstance) {
    let (id, mut pending) = start(engine).await;
    while pending.stage_number() < target {
        pending = approve_stage(engine, &pending, branches)
            .await
            .expect("workflow closed before target stage");
    }
    assert_eq!(pending.stage_number(), target, "target stage was skipped");
    (id, pending)
}
