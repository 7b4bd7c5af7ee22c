// Copyright 2025 Cowboy AI, LLC.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use opex_workflow::{
    AggregateRoot, DecisionKind, DecisionPayload, InMemoryUserDirectory, InMemoryWorkflowStore,
    Money, NewInitiative, RecordingNotifier, Role, User, WorkflowDefinition, WorkflowEngine,
};
use tokio::runtime::Runtime;

type Engine = WorkflowEngine<InMemoryWorkflowStore, InMemoryUserDirectory, RecordingNotifier>;

fn setup_runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

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

async fn walk(engine: &Engine, branches: bool) -> usize {
    let actors: Vec<_> = users().iter().map(User::acting).collect();
    let registered = engine
        .register(
            NewInitiative::new("Reduce steam losses", "NDS", "OP", Money::from_major(10_000)),
            &actors[0],
        )
        .await
        .unwrap();
    let mut pending = engine
        .submit(registered.initiative.id(), &actors[0])
        .await
        .unwrap()
        .current_stage;

    let mut approved = 0;
    while let Some(stage) = pending {
        let definition = engine.definition().stage(stage.stage_number()).unwrap();
        let actor = match definition.required_role {
            Role::InitLead => &actors[0],
            Role::Approver => &actors[1],
            Role::CorpTso => &actors[3],
            _ => &actors[2],
        };
        let payload = match definition.decision {
            Some(DecisionKind::AssignResponsibilities) => DecisionPayload::assign(1u64),
            Some(DecisionKind::MocRequirement) => {
                DecisionPayload::moc(branches, branches.then_some("MOC-1"))
            }
            Some(DecisionKind::CapexRequirement) => {
                DecisionPayload::capex(branches, branches.then_some("CAPEX-1"))
            }
            None => DecisionPayload::none(),
        };
        pending = engine
            .approve(stage.id(), actor, "ok", payload)
            .await
            .unwrap()
            .current_stage;
        approved += 1;
    }
    approved
}

fn benchmark_full_walk(c: &mut Criterion) {
    let rt = setup_runtime();
    let mut group = c.benchmark_group("full_walk");

    for branches in [false, true] {
        group.bench_with_input(
            BenchmarkId::from_parameter(if branches { "all_stages" } else { "skipping" }),
            &branches,
            |b, &branches| {
                let engine = engine();
                b.to_async(&rt).iter(|| async { black_box(walk(&engine, branches).await) });
            },
        );
    }

    group.finish();
}

fn benchmark_pending_approvals(c: &mut Criterion) {
    let rt = setup_runtime();
    let engine = engine();

    rt.block_on(async {
        for _ in 0..200 {
            let registered = engine
                .register(
                    NewInitiative::new("Queue filler", "NDS", "OP", Money::ZERO),
                    &users()[0].acting(),
                )
                .await
                .unwrap();
            engine
                .submit(registered.initiative.id(), &users()[0].acting())
                .await
                .unwrap();
        }
    });

    c.bench_function("pending_approvals_200", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(engine.pending_approvals(1u64.into()).await.unwrap().len()) });
    });
}

criterion_group!(benches, benchmark_full_walk, benchmark_pending_approvals);
criterion_main!(benches);
