// Copyright 2025 Cowboy AI, LLC.

//! Initiative pipeline projection
//!
//! Dashboard KPIs: how many initiatives sit in each status and at each stage,
//! and how much expected savings each status carries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::{EventSequence, Projection};
use crate::errors::WorkflowResult;
use crate::identifiers::InitiativeId;
use crate::money::Money;
use crate::workflow::{InitiativeStatus, WorkflowEvent};

/// What the projection knows about one initiative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineEntry {
    /// Site code
    pub site: String,
    /// Lifecycle status
    pub status: InitiativeStatus,
    /// Pending stage while in progress
    pub current_stage: Option<u8>,
    /// Expected savings at registration
    pub expected_savings: Money,
    /// Stages skipped so far in the current cycle
    pub skipped_stages: Vec<u8>,
}

/// Projection maintaining pipeline counts and savings
#[derive(Debug, Clone, Default)]
pub struct InitiativePipelineProjection {
    initiatives: HashMap<InitiativeId, PipelineEntry>,
    checkpoint: Option<EventSequence>,
}

impl InitiativePipelineProjection {
    /// Create an empty projection
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for one initiative
    pub fn get(&self, id: InitiativeId) -> Option<&PipelineEntry> {
        self.initiatives.get(&id)
    }

    /// Number of tracked initiatives
    pub fn len(&self) -> usize {
        self.initiatives.len()
    }

    /// Whether nothing is tracked yet
    pub fn is_empty(&self) -> bool {
        self.initiatives.is_empty()
    }

    /// Initiatives per status
    pub fn count_by_status(&self) -> HashMap<InitiativeStatus, usize> {
        let mut counts = HashMap::new();
        for entry in self.initiatives.values() {
            *counts.entry(entry.status).or_insert(0) += 1;
        }
        counts
    }

    /// In-progress initiatives per pending stage
    pub fn count_by_stage(&self) -> BTreeMap<u8, usize> {
        let mut counts = BTreeMap::new();
        for stage in self.initiatives.values().filter_map(|e| e.current_stage) {
            *counts.entry(stage).or_insert(0) += 1;
        }
        counts
    }

    /// Expected savings per status
    pub fn savings_by_status(&self) -> HashMap<InitiativeStatus, Money> {
        let mut totals: HashMap<InitiativeStatus, Money> = HashMap::new();
        for entry in self.initiatives.values() {
            let total = totals.entry(entry.status).or_default();
            *total = *total + entry.expected_savings;
        }
        totals
    }

    /// Expected savings of initiatives at `site`
    pub fn savings_at_site(&self, site: &str) -> Money {
        self.initiatives
            .values()
            .filter(|e| e.site.eq_ignore_ascii_case(site))
            .map(|e| e.expected_savings)
            .sum()
    }

    fn entry(&mut self, id: InitiativeId, event: &WorkflowEvent) -> Option<&mut PipelineEntry> {
        let entry = self.initiatives.get_mut(&id);
        if entry.is_none() {
            debug!(initiative_id = %id, event = ?event, "event for unknown initiative ignored");
        }
        entry
    }
}

#[async_trait]
impl Projection for InitiativePipelineProjection {
    async fn handle_event(&mut self, event: &WorkflowEvent) -> WorkflowResult<()> {
        match event {
            WorkflowEvent::InitiativeRegistered {
                initiative_id,
                site,
                expected_savings,
                ..
            } => {
                self.initiatives.insert(
                    *initiative_id,
                    PipelineEntry {
                        site: site.clone(),
                        status: InitiativeStatus::Draft,
                        current_stage: None,
                        expected_savings: *expected_savings,
                        skipped_stages: Vec::new(),
                    },
                );
            }
            WorkflowEvent::InitiativeSubmitted {
                initiative_id,
                stage_number,
                ..
            }
            | WorkflowEvent::InitiativeResubmitted {
                initiative_id,
                stage_number,
                ..
            } => {
                if let Some(entry) = self.entry(*initiative_id, event) {
                    entry.status = InitiativeStatus::InProgress;
                    entry.current_stage = Some(*stage_number);
                    entry.skipped_stages.clear();
                }
            }
            WorkflowEvent::StageApproved {
                initiative_id,
                next_stage,
                ..
            } => {
                if let Some(entry) = self.entry(*initiative_id, event) {
                    entry.current_stage = *next_stage;
                }
            }
            WorkflowEvent::StageSkipped {
                initiative_id,
                stage_number,
                ..
            } => {
                if let Some(entry) = self.entry(*initiative_id, event) {
                    entry.skipped_stages.push(*stage_number);
                }
            }
            WorkflowEvent::StageRejected { initiative_id, .. } => {
                if let Some(entry) = self.entry(*initiative_id, event) {
                    entry.status = InitiativeStatus::Rejected;
                    entry.current_stage = None;
                }
            }
            WorkflowEvent::InitiativeClosed { initiative_id, .. } => {
                if let Some(entry) = self.entry(*initiative_id, event) {
                    entry.status = InitiativeStatus::Closed;
                    entry.current_stage = None;
                }
            }
        }
        Ok(())
    }

    async fn get_checkpoint(&self) -> Option<EventSequence> {
        self.checkpoint
    }

    async fn save_checkpoint(&mut self, sequence: EventSequence) -> WorkflowResult<()> {
        self.checkpoint = Some(sequence);
        Ok(())
    }

    async fn clear(&mut self) -> WorkflowResult<()> {
        self.initiatives.clear();
        self.checkpoint = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{InitiativeCode, StageInstanceId, UserId};
    use crate::workflow::StageDecision;
    use chrono::Utc;

    fn registered(id: InitiativeId, site: &str, savings: i64) -> WorkflowEvent {
        WorkflowEvent::InitiativeRegistered {
            initiative_id: id,
            code: format!("{site}/25/OP/AB/001").parse::<InitiativeCode>().unwrap(),
            site: site.to_string(),
            expected_savings: Money::from_major(savings),
            registered_by: UserId(1),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_counts_and_savings_follow_events() {
        let mut projection = InitiativePipelineProjection::new();
        let a = InitiativeId::new();
        let b = InitiativeId::new();
        let now = Utc::now();

        let events = vec![
            registered(a, "NDS", 100),
            registered(b, "HSD1", 40),
            WorkflowEvent::InitiativeSubmitted {
                initiative_id: a,
                stage_number: 1,
                submitted_by: UserId(1),
                occurred_at: now,
            },
            WorkflowEvent::StageApproved {
                initiative_id: a,
                stage_instance_id: StageInstanceId::new(),
                stage_number: 1,
                decision: StageDecision::None,
                next_stage: Some(2),
                approved_by: UserId(1),
                occurred_at: now,
            },
        ];
        for (seq, event) in events.iter().enumerate() {
            projection.handle_event(event).await.unwrap();
            projection
                .save_checkpoint(EventSequence::new(seq as u64 + 1))
                .await
                .unwrap();
        }

        let counts = projection.count_by_status();
        assert_eq!(counts.get(&InitiativeStatus::InProgress), Some(&1));
        assert_eq!(counts.get(&InitiativeStatus::Draft), Some(&1));
        assert_eq!(projection.count_by_stage().get(&2), Some(&1));
        assert_eq!(
            projection.savings_by_status().get(&InitiativeStatus::InProgress),
            Some(&Money::from_major(100))
        );
        assert_eq!(projection.savings_at_site("nds"), Money::from_major(100));
        assert_eq!(projection.get_checkpoint().await, Some(EventSequence::new(4)));

        projection
            .handle_event(&WorkflowEvent::StageRejected {
                initiative_id: a,
                stage_instance_id: StageInstanceId::new(),
                stage_number: 2,
                rejected_by: UserId(2),
                comment: "no".into(),
                occurred_at: now,
            })
            .await
            .unwrap();
        assert_eq!(projection.get(a).unwrap().status, InitiativeStatus::Rejected);
        assert!(projection.count_by_stage().is_empty());

        projection.clear().await.unwrap();
        assert!(projection.is_empty());
        assert_eq!(projection.get_checkpoint().await, None);
    }

    #[tokio::test]
    async fn test_unknown_initiative_is_ignored() {
        let mut projection = InitiativePipelineProjection::new();
        projection
            .handle_event(&WorkflowEvent::InitiativeClosed {
                initiative_id: InitiativeId::new(),
                stage_number: 15,
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();
        assert!(projection.is_empty());
    }
}
