// Copyright 2025 Cowboy AI, LLC.

//! Notification collaborator
//!
//! The engine hands `approved`, `rejected` and `closed` notifications to a
//! [`StageNotifier`] after a transition has been committed. Delivery is best
//! effort: a failing notifier is logged and never rolls the transition back.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::errors::WorkflowResult;
use crate::identifiers::InitiativeId;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// A stage was approved
    Approved,
    /// A stage was rejected
    Rejected,
    /// The initiative completed its final stage
    Closed,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationKind::Approved => "approved",
            NotificationKind::Rejected => "rejected",
            NotificationKind::Closed => "closed",
        })
    }
}

/// Payload delivered to downstream toast, email and audit fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNotification {
    /// Event kind
    pub event: NotificationKind,
    /// Initiative concerned
    pub initiative_id: InitiativeId,
    /// Stage that was decided
    pub stage_number: u8,
}

/// Receives workflow notifications
#[async_trait]
pub trait StageNotifier: Send + Sync {
    /// Deliver one notification
    async fn notify(&self, notification: &WorkflowNotification) -> WorkflowResult<()>;
}

/// Notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl StageNotifier for TracingNotifier {
    async fn notify(&self, notification: &WorkflowNotification) -> WorkflowResult<()> {
        info!(
            initiative_id = %notification.initiative_id,
            stage = notification.stage_number,
            event = %notification.event,
            "workflow notification"
        );
        Ok(())
    }
}

/// Notifier that keeps every notification for later inspection
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<WorkflowNotification>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far
    pub async fn sent(&self) -> Vec<WorkflowNotification> {
        self.sent.lock().await.clone()
    }

    /// Forget everything received so far
    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl StageNotifier for RecordingNotifier {
    async fn notify(&self, notification: &WorkflowNotification) -> WorkflowResult<()> {
        self.sent.lock().await.push(*notification);
        Ok(())
    }
}
