// Copyright 2025 Cowboy AI, LLC.

//! Read model projections
//!
//! Dashboard read models fed from the events each engine command returns.
//! A projection only ever sees events after their transition committed.

pub mod pipeline;

pub use pipeline::{InitiativePipelineProjection, PipelineEntry};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::WorkflowResult;
use crate::workflow::WorkflowEvent;

/// A read model rebuilt from [`WorkflowEvent`]s
#[async_trait]
pub trait Projection: Send + Sync {
    /// Fold one event into the read model
    async fn handle_event(&mut self, event: &WorkflowEvent) -> WorkflowResult<()>;

    /// Position of the last folded event, if any
    async fn get_checkpoint(&self) -> Option<EventSequence>;

    /// Record the position reached by the caller's event feed
    async fn save_checkpoint(&mut self, sequence: EventSequence) -> WorkflowResult<()>;

    /// Drop all state before a replay
    async fn clear(&mut self) -> WorkflowResult<()>;
}

/// Position in the caller's event feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventSequence(pub u64);

impl EventSequence {
    /// Position `seq`
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Raw position
    pub fn value(&self) -> u64 {
        self.0
    }
}
