//! Versioned data envelopes and the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lifecycle::ExecutionStatus;

/// One versioned value in the shared store.
///
/// Every write stamps who wrote it and when, and bumps `version` by exactly
/// one; the first write of a key is version 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataEntry {
    pub value: Value,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// One audit trail event, serialized with a `type` tag so the durable
/// snapshot reads as a flat event list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    /// A data key changed. Value renderings are truncated for the trail;
    /// the live value is in the store itself.
    DataUpdate {
        key: String,
        agent: String,
        previous_value: Option<String>,
        new_value: String,
        timestamp: DateTime<Utc>,
    },
    /// A mailbox message was posted.
    #[serde(rename = "agent_message")]
    MessagePosted {
        from: String,
        to: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker finished a run (written by the RECORD phase).
    #[serde(rename = "agent_action")]
    WorkerAction {
        agent: String,
        action: String,
        status: ExecutionStatus,
        summary: String,
        timestamp: DateTime<Utc>,
    },
}

impl HistoryEvent {
    pub fn is_worker_action(&self) -> bool {
        matches!(self, HistoryEvent::WorkerAction { .. })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HistoryEvent::DataUpdate { timestamp, .. }
            | HistoryEvent::MessagePosted { timestamp, .. }
            | HistoryEvent::WorkerAction { timestamp, .. } => *timestamp,
        }
    }
}
