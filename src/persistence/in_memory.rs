// Copyright 2025 Cowboy AI, LLC.

//! In-memory workflow store

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{check_still_pending, TransitionBatch, WorkflowStore};
use crate::entity::AggregateRoot;
use crate::errors::WorkflowResult;
use crate::identifiers::{InitiativeId, StageInstanceId};
use crate::workflow::{Initiative, WorkflowStageInstance};

#[derive(Debug, Default)]
struct Tables {
    initiatives: HashMap<InitiativeId, Initiative>,
    instances: IndexMap<StageInstanceId, WorkflowStageInstance>,
    sequences: HashMap<String, u32>,
}

/// Store keeping everything behind a single lock
///
/// Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkflowStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryWorkflowStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored initiatives
    pub async fn initiative_count(&self) -> usize {
        self.tables.read().await.initiatives.len()
    }

    /// Number of stored stage instances
    pub async fn stage_instance_count(&self) -> usize {
        self.tables.read().await.instances.len()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn load_initiative(&self, id: InitiativeId) -> WorkflowResult<Option<Initiative>> {
        Ok(self.tables.read().await.initiatives.get(&id).cloned())
    }

    async fn load_initiatives(&self) -> WorkflowResult<Vec<Initiative>> {
        Ok(self.tables.read().await.initiatives.values().cloned().collect())
    }

    async fn load_stage_instances(
        &self,
        initiative_id: InitiativeId,
    ) -> WorkflowResult<Vec<WorkflowStageInstance>> {
        let tables = self.tables.read().await;
        Ok(tables
            .instances
            .values()
            .filter(|i| i.initiative_id() == initiative_id)
            .cloned()
            .collect())
    }

    async fn load_stage_instance(
        &self,
        id: StageInstanceId,
    ) -> WorkflowResult<Option<WorkflowStageInstance>> {
        Ok(self.tables.read().await.instances.get(&id).cloned())
    }

    async fn load_pending_stage_instances(&self) -> WorkflowResult<Vec<WorkflowStageInstance>> {
        let tables = self.tables.read().await;
        Ok(tables
            .instances
            .values()
            .filter(|i| i.is_pending())
            .cloned()
            .collect())
    }

    async fn save_initiative(&self, initiative: &Initiative) -> WorkflowResult<()> {
        self.tables
            .write()
            .await
            .initiatives
            .insert(initiative.id(), initiative.clone());
        Ok(())
    }

    async fn save_stage_instance(&self, instance: &WorkflowStageInstance) -> WorkflowResult<()> {
        self.tables
            .write()
            .await
            .instances
            .insert(instance.id(), instance.clone());
        Ok(())
    }

    async fn next_code_sequence(&self, scope: &str) -> WorkflowResult<u32> {
        let mut tables = self.tables.write().await;
        let next = tables.sequences.entry(scope.to_string()).or_insert(0);
        *next += 1;
        Ok(*next)
    }

    async fn commit(&self, batch: TransitionBatch) -> WorkflowResult<()> {
        batch.validate()?;
        let mut tables = self.tables.write().await;

        batch.check_version(tables.initiatives.get(&batch.initiative_id()))?;
        for instance in &batch.instances {
            check_still_pending(tables.instances.get(&instance.id()))?;
        }

        for instance in batch.instances {
            tables.instances.insert(instance.id(), instance);
        }
        tables
            .initiatives
            .insert(batch.initiative.id(), batch.initiative);
        Ok(())
    }
}
