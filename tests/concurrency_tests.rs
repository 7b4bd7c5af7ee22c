// Copyright 2025 Cowboy AI, LLC.

//! Concurrent decisions, store consistency and notifier failure handling

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use mockall::mock;
use opex_workflow::{
    DecisionPayload, InMemoryUserDirectory, InMemoryWorkflowStore, InitiativeStatus,
    InstrumentedStore, NotificationKind, RecordingNotifier, StageNotifier, WorkflowDefinition,
    WorkflowEngine, WorkflowError, WorkflowNotification, WorkflowResult, WorkflowStore,
};

mock! {
    pub Notifier {}

    #[async_trait]
    impl StageNotifier for Notifier {
        async fn notify(&self, notification: &WorkflowNotification) -> WorkflowResult<()>;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_approvals_of_one_stage_commit_once() {
    let engine = Arc::new(engine());
    let (id, stage2) = walk_to(engine.as_ref(), Branches::NONE, 2).await;

    let first = {
        let engine = Arc::clone(&engine);
        let stage = stage2.id();
        async move {
            engine
                .approve(stage, &actor(APPROVER), "first", DecisionPayload::none())
                .await
        }
    };
    let second = {
        let engine = Arc::clone(&engine);
        let stage = stage2.id();
        async move {
            engine
                .approve(stage, &actor(NOT_A_LEAD), "second", DecisionPayload::none())
                .await
        }
    };
    let (a, b) = tokio::join!(first, second);

    let results = [a, b];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    let failure = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(failure, WorkflowError::StaleStageState { .. }));

    let stages = engine.store().load_stage_instances(id).await.unwrap();
    assert_eq!(stages.iter().filter(|s| s.stage_number() == 3).count(), 1);
    assert_eq!(stages.iter().filter(|s| s.is_pending()).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engines_sharing_a_store_detect_conflicts() {
    let store = InMemoryWorkflowStore::new();
    let directory = InMemoryUserDirectory::with_users(users());
    let left = WorkflowEngine::new(
        WorkflowDefinition::standard(),
        store.clone(),
        directory.clone(),
        RecordingNotifier::new(),
    );
    let right = WorkflowEngine::new(
        WorkflowDefinition::standard(),
        store.clone(),
        directory,
        RecordingNotifier::new(),
    );
    let (id, stage2) = walk_to(&left, Branches::NONE, 2).await;

    let approver = actor(APPROVER);
    let not_a_lead = actor(NOT_A_LEAD);
    let (a, b) = tokio::join!(
        left.approve(stage2.id(), &approver, "left", DecisionPayload::none()),
        right.reject(stage2.id(), &not_a_lead, "right"),
    );

    assert!(a.is_ok() != b.is_ok(), "exactly one decision must win");
    let loser = a.err().or(b.err()).unwrap();
    assert!(loser.is_concurrency_error());

    let pending = store
        .load_stage_instances(id)
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.is_pending())
        .count();
    let initiative = store.load_initiative(id).await.unwrap().unwrap();
    match initiative.status() {
        InitiativeStatus::InProgress => assert_eq!(pending, 1),
        InitiativeStatus::Rejected => assert_eq!(pending, 0),
        other => panic!("unexpected status {other}"),
    }
}

#[tokio::test]
async fn failing_notifier_does_not_roll_back_transition() {
    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify()
        .returning(|_| Err(WorkflowError::Persistence("mail relay down".into())));
    let engine = engine_with(notifier);

    let (id, stage1) = start(&engine).await;
    let outcome = engine
        .approve(stage1.id(), &actor(LEAD), "registered", DecisionPayload::none())
        .await
        .unwrap();

    assert_eq!(outcome.current_stage.unwrap().stage_number(), 2);
    let current = engine.current_stage(id).await.unwrap().unwrap();
    assert_eq!(current.stage_number(), 2);
}

#[tokio::test]
async fn notifier_receives_approval_for_decided_stage() {
    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify()
        .withf(|n| n.event == NotificationKind::Approved && n.stage_number == 1)
        .times(1)
        .returning(|_| Ok(()));
    let engine = engine_with(notifier);

    let (_, stage1) = start(&engine).await;
    engine
        .approve(stage1.id(), &actor(LEAD), "registered", DecisionPayload::none())
        .await
        .unwrap();
}

#[tokio::test]
async fn instrumented_store_counts_engine_traffic() {
    let store = InstrumentedStore::new(InMemoryWorkflowStore::new());
    let engine = WorkflowEngine::new(
        WorkflowDefinition::standard(),
        store,
        InMemoryUserDirectory::with_users(users()),
        RecordingNotifier::new(),
    );

    let registered = engine
        .register(
            opex_workflow::NewInitiative::new("Trim idle pumps", "NDS", "OP", opex_workflow::Money::ZERO),
            &actor(LEAD),
        )
        .await
        .unwrap();
    let id = opex_workflow::AggregateRoot::id(&registered.initiative);
    engine.submit(id, &actor(LEAD)).await.unwrap();
    let err = engine.submit(id, &actor(LEAD)).await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidStateTransition { .. }));

    let metrics = engine.store().metrics();
    assert_eq!(metrics.calls("store.next_code_sequence").await, 1);
    assert_eq!(metrics.calls("store.commit").await, 2);
    assert_eq!(metrics.errors("store.commit").await, 0);
    assert!(metrics.calls("store.load_initiative").await >= 2);
    assert!(metrics.avg_duration("store.commit").await.is_some());
}
