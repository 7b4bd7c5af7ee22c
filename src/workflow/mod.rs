// Copyright 2025 Cowboy AI, LLC.

//! Stage-gated approval workflow for initiatives
//!
//! - [`definition`]: the static stage table and activation rules
//! - [`initiative`] and [`stage`]: the aggregate and its stage instances
//! - [`engine`]: commands that move initiatives through the table
//! - [`queries`]: read-side views used by dashboards

pub mod commands;
pub mod decision;
pub mod definition;
pub mod engine;
pub mod events;
pub mod initiative;
pub mod queries;
pub mod stage;
pub mod state;

pub use commands::WorkflowCommand;
pub use decision::{DecisionPayload, StageDecision};
pub use definition::{
    ActivationRule, Advance, BranchFlags, DecisionKind, StageDefinition, StageFlag,
    WorkflowDefinition,
};
pub use engine::{TransitionOutcome, WorkflowEngine};
pub use events::{DomainEvent, WorkflowEvent};
pub use initiative::{Initiative, NewInitiative, Priority, RegistrationLimits};
pub use stage::WorkflowStageInstance;
pub use state::{InitiativeStatus, StageStatus, State, WorkflowPosition};
