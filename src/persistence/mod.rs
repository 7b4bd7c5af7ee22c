// Copyright 2025 Cowboy AI, LLC.

//! # Persistence Layer
//!
//! The engine talks to storage only through [`WorkflowStore`]. One engine call
//! produces one [`TransitionBatch`], committed atomically with an optimistic
//! version check on the initiative.
//!
//! ## Components
//!
//! - **In-memory store**: reference implementation, one lock over all tables
//! - **NATS KV store**: JetStream key-value bucket with revision-based CAS
//! - **Instrumented store**: metrics wrapper around any store

pub mod in_memory;
pub mod instrumented_store;
pub mod metrics;
pub mod nats_kv_store;

pub use in_memory::InMemoryWorkflowStore;
pub use instrumented_store::InstrumentedStore;
pub use metrics::{DurationStats, MetricsSummary, MetricsTimer, PersistenceMetrics};
pub use nats_kv_store::{NatsKvConfig, NatsKvWorkflowStore, NatsKvWorkflowStoreBuilder};

use async_trait::async_trait;

use crate::entity::AggregateRoot;
use crate::errors::{WorkflowError, WorkflowResult};
use crate::identifiers::{InitiativeId, StageInstanceId};
use crate::workflow::{Initiative, WorkflowStageInstance};

/// Everything one engine call writes
///
/// `expected_version` is the initiative version the engine read before
/// mutating; `None` means the initiative is new. `instances` are upserted:
/// new instances are inserted, existing ones must still be pending in the
/// store or the commit fails with `StaleStageState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionBatch {
    /// Initiative after the transition
    pub initiative: Initiative,
    /// Version read before the transition
    pub expected_version: Option<u64>,
    /// Stage instances created or decided by the transition
    pub instances: Vec<WorkflowStageInstance>,
}

impl TransitionBatch {
    /// Batch inserting a new initiative
    pub fn insert(initiative: Initiative) -> Self {
        Self {
            initiative,
            expected_version: None,
            instances: Vec::new(),
        }
    }

    /// Batch updating an initiative read at `expected_version`
    pub fn update(
        initiative: Initiative,
        expected_version: u64,
        instances: Vec<WorkflowStageInstance>,
    ) -> Self {
        Self {
            initiative,
            expected_version: Some(expected_version),
            instances,
        }
    }

    /// Initiative the batch writes
    pub fn initiative_id(&self) -> InitiativeId {
        self.initiative.id()
    }

    /// Check that the batch is internally consistent
    pub fn validate(&self) -> WorkflowResult<()> {
        let id = self.initiative.id();
        if let Some(stray) = self.instances.iter().find(|i| i.initiative_id() != id) {
            return Err(WorkflowError::Persistence(format!(
                "stage instance {} belongs to initiative {}, not {id}",
                stray.id(),
                stray.initiative_id()
            )));
        }
        if self.instances.iter().filter(|i| i.is_pending()).count() > 1 {
            return Err(WorkflowError::Persistence(format!(
                "batch for initiative {id} carries more than one pending stage"
            )));
        }
        Ok(())
    }

    /// Compare the stored version with the expected one
    pub(crate) fn check_version(&self, stored: Option<&Initiative>) -> WorkflowResult<()> {
        match (self.expected_version, stored) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(WorkflowError::stale(format!(
                "initiative {} already exists",
                self.initiative_id()
            ))),
            (Some(_), None) => Err(WorkflowError::not_found("Initiative", self.initiative_id())),
            (Some(expected), Some(current)) if current.version() == expected => Ok(()),
            (Some(expected), Some(current)) => Err(WorkflowError::stale(format!(
                "initiative {} is at version {}, expected {expected}",
                self.initiative_id(),
                current.version()
            ))),
        }
    }
}

/// Fail unless `stored` is absent or still pending
pub(crate) fn check_still_pending(stored: Option<&WorkflowStageInstance>) -> WorkflowResult<()> {
    match stored {
        Some(existing) => existing.ensure_pending(),
        None => Ok(()),
    }
}

/// Storage for initiatives and their stage instances
///
/// Reads return a consistent snapshot: an instance is either fully before or
/// fully after a committed batch.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Load an initiative
    async fn load_initiative(&self, id: InitiativeId) -> WorkflowResult<Option<Initiative>>;

    /// Every initiative, in no particular order
    async fn load_initiatives(&self) -> WorkflowResult<Vec<Initiative>>;

    /// Stage instances of one initiative, including history
    async fn load_stage_instances(
        &self,
        initiative_id: InitiativeId,
    ) -> WorkflowResult<Vec<WorkflowStageInstance>>;

    /// Load one stage instance
    async fn load_stage_instance(
        &self,
        id: StageInstanceId,
    ) -> WorkflowResult<Option<WorkflowStageInstance>>;

    /// Every pending stage instance across all initiatives
    async fn load_pending_stage_instances(&self) -> WorkflowResult<Vec<WorkflowStageInstance>>;

    /// Write an initiative without a version check
    async fn save_initiative(&self, initiative: &Initiative) -> WorkflowResult<()>;

    /// Write a stage instance without a pending check
    async fn save_stage_instance(&self, instance: &WorkflowStageInstance) -> WorkflowResult<()>;

    /// Next 1-based initiative code sequence within `scope`
    async fn next_code_sequence(&self, scope: &str) -> WorkflowResult<u32>;

    /// Apply a batch atomically, or nothing at all
    async fn commit(&self, batch: TransitionBatch) -> WorkflowResult<()>;
}
