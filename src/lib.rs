// Copyright 2025 Cowboy AI, LLC.

//! # OpEx Workflow
//!
//! Stage-gated approval workflow for operational-excellence initiatives.
//!
//! An initiative is registered as a draft, submitted into a fixed sequence of
//! stages, and approved or rejected stage by stage until it closes. Each stage
//! requires a role; decision stages record a branch outcome (MOC required?
//! CAPEX required?) that switches conditional stages on or off.
//!
//! This crate provides:
//! - **Stage table**: declarative stage definitions with activation rules
//! - **Aggregate**: the [`Initiative`] and its [`WorkflowStageInstance`]s
//! - **Engine**: [`WorkflowEngine`] commands and queries
//! - **Collaborators**: [`WorkflowStore`], [`UserDirectory`], [`StageNotifier`]
//! - **Read models**: event-fed projections for dashboards
//!
//! ## Design Principles
//!
//! 1. **Explicit actor**: every command takes the acting user as a parameter
//! 2. **One pending stage**: per-initiative locking plus optimistic commits
//! 3. **Atomic transitions**: one batch per command, all or nothing
//! 4. **Capabilities, not strings**: composite roles are sets of base roles
//!
//! ## Example
//!
//! ```rust
//! use opex_workflow::{
//!     AggregateRoot, DecisionPayload, InMemoryUserDirectory, InMemoryWorkflowStore, Money, NewInitiative,
//!     Role, TracingNotifier, User, WorkflowDefinition, WorkflowEngine,
//! };
//!
//! # tokio_test::block_on(async {
//! let lead = User::new(1, "Anil Bansal", "anil@example.com", "NDS", "OP", Role::InitLead);
//! let approver = User::new(2, "Priya Shah", "priya@example.com", "NDS", "OP", Role::Approver);
//! let engine = WorkflowEngine::new(
//!     WorkflowDefinition::standard(),
//!     InMemoryWorkflowStore::new(),
//!     InMemoryUserDirectory::with_users([lead.clone(), approver]),
//!     TracingNotifier,
//! );
//!
//! let draft = engine
//!     .register(NewInitiative::new("Reduce steam losses", "NDS", "OP", Money::from_major(50_000)), &lead.acting())
//!     .await?;
//! assert!(draft.initiative.code().to_string().starts_with("NDS/"));
//!
//! let submitted = engine.submit(draft.initiative.id(), &lead.acting()).await?;
//! let stage1 = submitted.current_stage.expect("stage 1 is pending");
//!
//! let approved = engine
//!     .approve(stage1.id(), &lead.acting(), "registered", DecisionPayload::none())
//!     .await?;
//! assert_eq!(approved.initiative.current_stage(), 2);
//! # Ok::<(), opex_workflow::WorkflowError>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]

pub mod config;
mod entity;
mod errors;
mod identifiers;
pub mod identity;
mod money;
pub mod notification;
pub mod persistence;
pub mod projections;
mod roles;
pub mod workflow;

pub use config::EngineConfig;
pub use entity::AggregateRoot;
pub use errors::{WorkflowError, WorkflowResult};
pub use identifiers::{InitiativeCode, InitiativeId, StageInstanceId, UserId};
pub use identity::{ActingUser, InMemoryUserDirectory, User, UserDirectory};
pub use money::Money;
pub use notification::{
    NotificationKind, RecordingNotifier, StageNotifier, TracingNotifier, WorkflowNotification,
};
pub use persistence::{
    InMemoryWorkflowStore, InstrumentedStore, NatsKvConfig, NatsKvWorkflowStore,
    PersistenceMetrics, TransitionBatch, WorkflowStore,
};
pub use projections::{EventSequence, InitiativePipelineProjection, Projection};
pub use roles::Role;
pub use workflow::{
    ActivationRule, DecisionKind, DecisionPayload, DomainEvent, Initiative, InitiativeStatus,
    NewInitiative, Priority, RegistrationLimits, StageDecision, StageDefinition, StageFlag,
    StageStatus, State, TransitionOutcome, WorkflowCommand, WorkflowDefinition, WorkflowEngine,
    WorkflowEvent, WorkflowPosition, WorkflowStageInstance,
};
