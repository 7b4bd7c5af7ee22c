// Copyright 2025 Cowboy AI, LLC.

//! NATS JetStream KV workflow store
//!
//! Each initiative is stored together with its stage instances as one JSON
//! record under `initiative.<id>`, so a [`TransitionBatch`] is a single
//! compare-and-set on that key using the revision read before the write.
//! A secondary key `instance.<id>` maps a stage instance to its initiative,
//! and `sequence.<scope>` holds the last issued code sequence.

use async_nats::jetstream::{self, kv};
use async_nats::Client;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{check_still_pending, TransitionBatch, WorkflowStore};
use crate::entity::AggregateRoot;
use crate::errors::{WorkflowError, WorkflowResult};
use crate::identifiers::{InitiativeId, StageInstanceId};
use crate::workflow::{Initiative, WorkflowStageInstance};

const INITIATIVE_PREFIX: &str = "initiative.";
const INSTANCE_PREFIX: &str = "instance.";
const SEQUENCE_PREFIX: &str = "sequence.";
const SEQUENCE_ATTEMPTS: usize = 16;

/// Configuration for the NATS KV store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsKvConfig {
    /// KV bucket name
    pub bucket_name: String,
    /// History depth for KV entries
    pub history: i64,
    /// TTL for entries (0 = no expiry)
    pub ttl_seconds: u64,
}

impl Default for NatsKvConfig {
    fn default() -> Self {
        Self {
            bucket_name: "opex-workflow".to_string(),
            history: 10,
            ttl_seconds: 0,
        }
    }
}

impl NatsKvConfig {
    /// Check bucket settings before talking to the server
    pub fn validate(&self) -> WorkflowResult<()> {
        let valid_name = !self.bucket_name.is_empty()
            && self
                .bucket_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_name {
            return Err(WorkflowError::Configuration(format!(
                "invalid KV bucket name: {:?}",
                self.bucket_name
            )));
        }
        if !(1..=64).contains(&self.history) {
            return Err(WorkflowError::Configuration(format!(
                "KV history must be between 1 and 64, got {}",
                self.history
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InitiativeRecord {
    initiative: Initiative,
    instances: Vec<WorkflowStageInstance>,
}

/// Workflow store backed by a JetStream KV bucket
#[derive(Clone)]
pub struct NatsKvWorkflowStore {
    kv: kv::Store,
    config: NatsKvConfig,
}

impl NatsKvWorkflowStore {
    /// Create or open the bucket described by `config`
    pub async fn new(client: Client, config: NatsKvConfig) -> WorkflowResult<Self> {
        config.validate()?;
        let js = jetstream::new(client);

        let kv_config = kv::Config {
            bucket: config.bucket_name.clone(),
            history: config.history,
            max_age: Duration::from_secs(config.ttl_seconds),
            storage: jetstream::stream::StorageType::File,
            ..Default::default()
        };

        let kv = js
            .create_key_value(kv_config)
            .await
            .map_err(|e| persistence("failed to create KV bucket", e))?;

        debug!(bucket = %config.bucket_name, "opened workflow KV bucket");
        Ok(Self { kv, config })
    }

    /// Bucket configuration
    pub fn config(&self) -> &NatsKvConfig {
        &self.config
    }

    async fn read_record(
        &self,
        id: InitiativeId,
    ) -> WorkflowResult<Option<(InitiativeRecord, u64)>> {
        let entry = self
            .kv
            .entry(initiative_key(id))
            .await
            .map_err(|e| persistence("failed to read initiative", e))?;

        match entry {
            Some(entry) if matches!(entry.operation, kv::Operation::Put) => {
                let record: InitiativeRecord = serde_json::from_slice(&entry.value)?;
                Ok(Some((record, entry.revision)))
            }
            _ => Ok(None),
        }
    }

    async fn write_record(&self, record: &InitiativeRecord) -> WorkflowResult<()> {
        let data = serde_json::to_vec(record)?;
        self.kv
            .put(initiative_key(record.initiative.id()), Bytes::from(data))
            .await
            .map_err(|e| persistence("failed to write initiative", e))?;
        Ok(())
    }

    async fn index_instance(&self, instance: &WorkflowStageInstance) -> WorkflowResult<()> {
        self.kv
            .put(
                instance_key(instance.id()),
                Bytes::from(instance.initiative_id().to_string()),
            )
            .await
            .map_err(|e| persistence("failed to index stage instance", e))?;
        Ok(())
    }

    async fn all_records(&self) -> WorkflowResult<Vec<InitiativeRecord>> {
        let keys: Vec<String> = self
            .kv
            .keys()
            .await
            .map_err(|e| persistence("failed to list keys", e))?
            .try_collect()
            .await
            .map_err(|e| persistence("failed to list keys", e))?;

        let mut records = Vec::new();
        for key in keys.iter().filter(|k| k.starts_with(INITIATIVE_PREFIX)) {
            let value = self
                .kv
                .get(key.as_str())
                .await
                .map_err(|e| persistence("failed to read initiative", e))?;
            if let Some(value) = value {
                records.push(serde_json::from_slice(&value)?);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl WorkflowStore for NatsKvWorkflowStore {
    async fn load_initiative(&self, id: InitiativeId) -> WorkflowResult<Option<Initiative>> {
        Ok(self.read_record(id).await?.map(|(r, _)| r.initiative))
    }

    async fn load_initiatives(&self) -> WorkflowResult<Vec<Initiative>> {
        Ok(self
            .all_records()
            .await?
            .into_iter()
            .map(|r| r.initiative)
            .collect())
    }

    async fn load_stage_instances(
        &self,
        initiative_id: InitiativeId,
    ) -> WorkflowResult<Vec<WorkflowStageInstance>> {
        Ok(self
            .read_record(initiative_id)
            .await?
            .map(|(r, _)| r.instances)
            .unwrap_or_default())
    }

    async fn load_stage_instance(
        &self,
        id: StageInstanceId,
    ) -> WorkflowResult<Option<WorkflowStageInstance>> {
        let owner = self
            .kv
            .get(instance_key(id))
            .await
            .map_err(|e| persistence("failed to read stage index", e))?;
        let Some(owner) = owner else {
            // The index is written after the record, so a crash in between leaves it missing
            return Ok(self
                .all_records()
                .await?
                .into_iter()
                .flat_map(|r| r.instances)
                .find(|i| i.id() == id));
        };
        let owner = std::str::from_utf8(&owner)
            .ok()
            .and_then(|s| s.parse::<uuid::Uuid>().ok())
            .map(InitiativeId::from_uuid)
            .ok_or_else(|| WorkflowError::Serialization(format!("corrupt index for {id}")))?;

        Ok(self.read_record(owner).await?.and_then(|(r, _)| {
            r.instances.into_iter().find(|i| i.id() == id)
        }))
    }

    async fn load_pending_stage_instances(&self) -> WorkflowResult<Vec<WorkflowStageInstance>> {
        Ok(self
            .all_records()
            .await?
            .into_iter()
            .flat_map(|r| r.instances)
            .filter(|i| i.is_pending())
            .collect())
    }

    async fn save_initiative(&self, initiative: &Initiative) -> WorkflowResult<()> {
        let instances = self
            .read_record(initiative.id())
            .await?
            .map(|(r, _)| r.instances)
            .unwrap_or_default();
        self.write_record(&InitiativeRecord {
            initiative: initiative.clone(),
            instances,
        })
        .await
    }

    async fn save_stage_instance(&self, instance: &WorkflowStageInstance) -> WorkflowResult<()> {
        let (mut record, _) = self
            .read_record(instance.initiative_id())
            .await?
            .ok_or_else(|| WorkflowError::not_found("Initiative", instance.initiative_id()))?;
        upsert(&mut record.instances, instance.clone());
        self.write_record(&record).await?;
        self.index_instance(instance).await
    }

    async fn next_code_sequence(&self, scope: &str) -> WorkflowResult<u32> {
        let key = sequence_key(scope);
        for _ in 0..SEQUENCE_ATTEMPTS {
            let entry = self
                .kv
                .entry(key.as_str())
                .await
                .map_err(|e| persistence("failed to read code sequence", e))?;

            match entry.filter(|e| matches!(e.operation, kv::Operation::Put)) {
                None => match self.kv.create(key.as_str(), Bytes::from_static(b"1")).await {
                    Ok(_) => return Ok(1),
                    Err(e) if matches!(e.kind(), kv::CreateErrorKind::AlreadyExists) => continue,
                    Err(e) => return Err(persistence("failed to create code sequence", e)),
                },
                Some(entry) => {
                    let current: u32 = std::str::from_utf8(&entry.value)
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| {
                            WorkflowError::Serialization(format!("corrupt code sequence {key}"))
                        })?;
                    let next = following_sequence(scope, current)?;
                    match self
                        .kv
                        .update(key.as_str(), Bytes::from(next.to_string()), entry.revision)
                        .await
                    {
                        Ok(_) => return Ok(next),
                        Err(e) if matches!(e.kind(), kv::UpdateErrorKind::WrongLastRevision) => continue,
                        Err(e) => return Err(persistence("failed to bump code sequence", e)),
                    }
                }
            }
        }
        Err(WorkflowError::Persistence(format!(
            "code sequence {scope} is too contended"
        )))
    }

    async fn commit(&self, batch: TransitionBatch) -> WorkflowResult<()> {
        batch.validate()?;
        let id = batch.initiative_id();
        let current = self.read_record(id).await?;

        batch.check_version(current.as_ref().map(|(r, _)| &r.initiative))?;
        let (mut instances, revision) = match current {
            Some((record, revision)) => (record.instances, Some(revision)),
            None => (Vec::new(), None),
        };
        for instance in &batch.instances {
            check_still_pending(instances.iter().find(|i| i.id() == instance.id()))?;
        }

        let unindexed = unindexed_instances(&instances, &batch.instances);
        for instance in batch.instances {
            upsert(&mut instances, instance);
        }

        let record = InitiativeRecord {
            initiative: batch.initiative,
            instances,
        };
        let data = Bytes::from(serde_json::to_vec(&record)?);
        let key = initiative_key(id);

        let written = match revision {
            None => self.kv.create(key.as_str(), data).await.map(|_| ()).map_err(|e| {
                if matches!(e.kind(), kv::CreateErrorKind::AlreadyExists) {
                    WorkflowError::stale(format!("initiative {id} was created concurrently"))
                } else {
                    persistence("failed to create initiative", e)
                }
            }),
            Some(revision) => self
                .kv
                .update(key.as_str(), data, revision)
                .await
                .map(|_| ())
                .map_err(|e| {
                    if matches!(e.kind(), kv::UpdateErrorKind::WrongLastRevision) {
                        WorkflowError::stale(format!("initiative {id} changed concurrently"))
                    } else {
                        persistence("failed to update initiative", e)
                    }
                }),
        };
        written?;

        for instance in &record.instances {
            if unindexed.contains(&instance.id()) {
                self.index_instance(instance).await?;
            }
        }
        Ok(())
    }
}

/// Builder for [`NatsKvWorkflowStore`]
#[derive(Default)]
pub struct NatsKvWorkflowStoreBuilder {
    client: Option<Client>,
    config: NatsKvConfig,
}

impl NatsKvWorkflowStoreBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the NATS client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Use a complete configuration
    pub fn config(mut self, config: NatsKvConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the bucket name
    pub fn bucket_name(mut self, name: impl Into<String>) -> Self {
        self.config.bucket_name = name.into();
        self
    }

    /// Set the history depth
    pub fn history(mut self, history: i64) -> Self {
        self.config.history = history;
        self
    }

    /// Set the TTL in seconds
    pub fn ttl_seconds(mut self, ttl: u64) -> Self {
        self.config.ttl_seconds = ttl;
        self
    }

    /// Build the store
    pub async fn build(self) -> WorkflowResult<NatsKvWorkflowStore> {
        let client = self
            .client
            .ok_or_else(|| WorkflowError::Configuration("NATS client not provided".to_string()))?;
        NatsKvWorkflowStore::new(client, self.config).await
    }
}

fn initiative_key(id: InitiativeId) -> String {
    format!("{INITIATIVE_PREFIX}{id}")
}

fn instance_key(id: StageInstanceId) -> String {
    format!("{INSTANCE_PREFIX}{id}")
}

/// Ids in `batch` that have no stored instance yet
fn unindexed_instances(
    stored: &[WorkflowStageInstance],
    batch: &[WorkflowStageInstance],
) -> Vec<StageInstanceId> {
    batch
        .iter()
        .map(|i| i.id())
        .filter(|id| !stored.iter().any(|s| s.id() == *id))
        .collect()
}

fn following_sequence(scope: &str, current: u32) -> WorkflowResult<u32> {
    current
        .checked_add(1)
        .ok_or_else(|| WorkflowError::Persistence(format!("code sequence {scope} is exhausted")))
}

fn sequence_key(scope: &str) -> String {
    format!("{SEQUENCE_PREFIX}{}", scope.replace('/', "."))
}

fn upsert(instances: &mut Vec<WorkflowStageInstance>, instance: WorkflowStageInstance) {
    match instances.iter_mut().find(|i| i.id() == instance.id()) {
        Some(slot) => *slot = instance,
        None => instances.push(instance),
    }
}

fn persistence(context: &str, err: impl std::fmt::Display) -> WorkflowError {
    WorkflowError::Persistence(format!("{context}: {err}"))
}
