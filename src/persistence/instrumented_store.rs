// Copyright 2025 Cowboy AI, LLC.

//! Store wrapper that adds metrics collection

use async_trait::async_trait;

use super::metrics::PersistenceMetrics;
use super::{TransitionBatch, WorkflowStore};
use crate::errors::WorkflowResult;
use crate::identifiers::{InitiativeId, StageInstanceId};
use crate::workflow::{Initiative, WorkflowStageInstance};

/// Wraps any [`WorkflowStore`] and times every call
#[derive(Debug, Clone)]
pub struct InstrumentedStore<S> {
    inner: S,
    metrics: PersistenceMetrics,
}

impl<S: WorkflowStore> InstrumentedStore<S> {
    /// Wrap `inner` with a fresh collector
    pub fn new(inner: S) -> Self {
        Self::with_metrics(inner, PersistenceMetrics::new())
    }

    /// Wrap `inner` reporting into an existing collector
    pub fn with_metrics(inner: S, metrics: PersistenceMetrics) -> Self {
        Self { inner, metrics }
    }

    /// The collector
    pub fn metrics(&self) -> &PersistenceMetrics {
        &self.metrics
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: WorkflowStore> WorkflowStore for InstrumentedStore<S> {
    async fn load_initiative(&self, id: InitiativeId) -> WorkflowResult<Option<Initiative>> {
        let timer = self.metrics.timer("store.load_initiative");
        let result = self.inner.load_initiative(id).await;
        timer.finish(&result).await;
        result
    }

    async fn load_initiatives(&self) -> WorkflowResult<Vec<Initiative>> {
        let timer = self.metrics.timer("store.load_initiatives");
        let result = self.inner.load_initiatives().await;
        timer.finish(&result).await;
        result
    }

    async fn load_stage_instances(
        &self,
        initiative_id: InitiativeId,
    ) -> WorkflowResult<Vec<WorkflowStageInstance>> {
        let timer = self.metrics.timer("store.load_stage_instances");
        let result = self.inner.load_stage_instances(initiative_id).await;
        timer.finish(&result).await;
        result
    }

    async fn load_stage_instance(
        &self,
        id: StageInstanceId,
    ) -> WorkflowResult<Option<WorkflowStageInstance>> {
        let timer = self.metrics.timer("store.load_stage_instance");
        let result = self.inner.load_stage_instance(id).await;
        timer.finish(&result).await;
        result
    }

    async fn load_pending_stage_instances(&self) -> WorkflowResult<Vec<WorkflowStageInstance>> {
        let timer = self.metrics.timer("store.load_pending_stage_instances");
        let result = self.inner.load_pending_stage_instances().await;
        timer.finish(&result).await;
        result
    }

    async fn save_initiative(&self, initiative: &Initiative) -> WorkflowResult<()> {
        let timer = self.metrics.timer("store.save_initiative");
        let result = self.inner.save_initiative(initiative).await;
        timer.finish(&result).await;
        result
    }

    async fn save_stage_instance(&self, instance: &WorkflowStageInstance) -> WorkflowResult<()> {
        let timer = self.metrics.timer("store.save_stage_instance");
        let result = self.inner.save_stage_instance(instance).await;
        timer.finish(&result).await;
        result
    }

    async fn next_code_sequence(&self, scope: &str) -> WorkflowResult<u32> {
        let timer = self.metrics.timer("store.next_code_sequence");
        let result = self.inner.next_code_sequence(scope).await;
        timer.finish(&result).await;
        result
    }

    async fn commit(&self, batch: TransitionBatch) -> WorkflowResult<()> {
        let timer = self.metrics.timer("store.commit");
        let result = self.inner.commit(batch).await;
        timer.finish(&result).await;
        result
    }
}
