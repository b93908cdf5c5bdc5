//! The shared case store.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lifecycle::ExecutionStatus;
use crate::settings::Settings;
use crate::utilities::json_file;
use crate::utilities::strings::truncate_chars;

use super::entry::{DataEntry, HistoryEvent};
use super::message::AgentMessage;
use super::workflow::{WorkflowState, WorkflowSummary, WorkflowUpdate};

/// Name of the case state file inside the case directory.
pub const STATE_FILE: &str = "workflow_memory.json";

/// History events written to the durable snapshot.
const HISTORY_PERSIST_CAP: usize = 100;
/// Messages written to the durable snapshot.
const MESSAGE_PERSIST_CAP: usize = 50;
/// Characters kept of a value rendering in the audit trail.
const VALUE_SUMMARY_CHARS: usize = 100;
/// Characters kept of a worker-action summary.
const ACTION_SUMMARY_CHARS: usize = 200;
/// Worker-action events surfaced in a context snapshot.
const RECENT_ACTIONS: usize = 10;

/// Durable snapshot of one case, as written to [`STATE_FILE`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub case_reference: String,
    pub last_updated: DateTime<Utc>,
    pub data: BTreeMap<String, DataEntry>,
    pub workflow_state: WorkflowState,
    #[serde(default)]
    pub history: Vec<HistoryEvent>,
    #[serde(default)]
    pub messages: Vec<AgentMessage>,
}

/// What a worker sees when it observes the case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub case_reference: String,
    pub workflow_phase: String,
    pub completed_steps: Vec<String>,
    pub pending_steps: Vec<String>,
    /// Unread messages for the observer. Observing does not mark them read.
    pub recent_messages: Vec<AgentMessage>,
    /// Known data keys, sorted.
    pub shared_data_keys: Vec<String>,
    /// Up to the ten most recent worker-action history events.
    pub recent_actions: Vec<HistoryEvent>,
}

/// Shared coordination state for one case: versioned data, a mailbox, the
/// workflow tracker and an audit trail.
///
/// Every mutation persists the full case state synchronously. Persistence
/// is best effort: a failed write is logged and the in-memory state remains
/// authoritative. One writer per case; concurrent writers would overwrite
/// each other's snapshots.
#[derive(Debug)]
pub struct Blackboard {
    case_reference: String,
    storage_path: Option<PathBuf>,
    data: BTreeMap<String, DataEntry>,
    workflow: WorkflowState,
    history: Vec<HistoryEvent>,
    messages: Vec<AgentMessage>,
}

impl Blackboard {
    /// Open the durable store for a case, loading the prior snapshot when
    /// one exists. A snapshot that cannot be read is logged and ignored;
    /// the case starts empty either way, so construction never fails.
    pub fn open(settings: &Settings, case_reference: &str) -> Self {
        let path = settings.case_dir(case_reference).join(STATE_FILE);
        let mut board = Self::blank(case_reference, Some(path));
        board.load();
        board
    }

    /// A store with no persistence path; state lives only in memory.
    pub fn in_memory(case_reference: &str) -> Self {
        Self::blank(case_reference, None)
    }

    fn blank(case_reference: &str, storage_path: Option<PathBuf>) -> Self {
        Self {
            case_reference: case_reference.to_string(),
            storage_path,
            data: BTreeMap::new(),
            workflow: WorkflowState::default(),
            history: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn case_reference(&self) -> &str {
        &self.case_reference
    }

    // ------------------------------------------------------------------
    // Shared data
    // ------------------------------------------------------------------

    /// Write `key`, bumping its version and recording the change in the
    /// audit trail.
    pub fn update(&mut self, key: &str, value: Value, author: &str) {
        let previous = self.data.get(key).map(|e| value_summary(&e.value));
        let version = self.data.get(key).map_or(1, |e| e.version + 1);
        let new_summary = value_summary(&value);
        self.data.insert(
            key.to_string(),
            DataEntry {
                value,
                updated_by: author.to_string(),
                updated_at: Utc::now(),
                version,
            },
        );
        self.history.push(HistoryEvent::DataUpdate {
            key: key.to_string(),
            agent: author.to_string(),
            previous_value: previous,
            new_value: new_summary,
            timestamp: Utc::now(),
        });
        log::debug!("[{}] {} set '{}' (v{})", self.case_reference, author, key, version);
        self.persist();
    }

    /// Current value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key).map(|e| &e.value)
    }

    /// Full versioned envelope for `key`.
    pub fn entry(&self, key: &str) -> Option<&DataEntry> {
        self.data.get(key)
    }

    /// Known data keys, sorted.
    pub fn data_keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Mailbox
    // ------------------------------------------------------------------

    /// Post a message to one worker, or to everyone via
    /// [`BROADCAST`](super::BROADCAST).
    pub fn post_message(&mut self, from: &str, to: &str, message: &str, payload: Option<Value>) {
        self.messages.push(AgentMessage {
            from: from.to_string(),
            to: to.to_string(),
            message: message.to_string(),
            payload,
            timestamp: Utc::now(),
            read: false,
        });
        self.history.push(HistoryEvent::MessagePosted {
            from: from.to_string(),
            to: to.to_string(),
            message: truncate_chars(message, VALUE_SUMMARY_CHARS),
            timestamp: Utc::now(),
        });
        log::debug!("[{}] message {} -> {}", self.case_reference, from, to);
        self.persist();
    }

    /// Unread messages addressed to `worker`, directly or broadcast. With
    /// `mark_read` the returned messages are flagged read and the state is
    /// persisted before returning.
    pub fn messages_for(&mut self, worker: &str, mark_read: bool) -> Vec<AgentMessage> {
        let mut selected = Vec::new();
        let mut changed = false;
        for message in self.messages.iter_mut() {
            if message.addressed_to(worker) && !message.read {
                if mark_read {
                    message.read = true;
                    changed = true;
                }
                selected.push(message.clone());
            }
        }
        if changed {
            self.persist();
        }
        selected
    }

    /// Drop every mailbox message.
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.persist();
    }

    fn unread_for(&self, worker: &str) -> Vec<AgentMessage> {
        self.messages
            .iter()
            .filter(|m| m.addressed_to(worker) && !m.read)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Workflow tracking
    // ------------------------------------------------------------------

    /// Apply a batched workflow change. Step insertion is idempotent;
    /// completing a step withdraws it from the pending list.
    pub fn update_workflow(&mut self, update: WorkflowUpdate) {
        self.workflow.apply(update);
        self.persist();
    }

    pub fn workflow(&self) -> &WorkflowState {
        &self.workflow
    }

    pub fn workflow_summary(&self) -> WorkflowSummary {
        self.workflow.summary()
    }

    // ------------------------------------------------------------------
    // Audit trail
    // ------------------------------------------------------------------

    /// Record a finished worker run. Summaries are truncated to 200
    /// characters.
    pub fn record_worker_action(
        &mut self,
        agent: &str,
        action: &str,
        status: ExecutionStatus,
        summary: &str,
    ) {
        self.history.push(HistoryEvent::WorkerAction {
            agent: agent.to_string(),
            action: action.to_string(),
            status,
            summary: truncate_chars(summary, ACTION_SUMMARY_CHARS),
            timestamp: Utc::now(),
        });
        log::info!(
            "[{}] {} {} '{}'",
            self.case_reference,
            agent,
            status,
            action
        );
        self.persist();
    }

    pub fn history(&self) -> &[HistoryEvent] {
        &self.history
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Snapshot the case as `worker` should see it. Read-only: unread
    /// messages stay unread.
    pub fn context_for(&self, worker: &str) -> ContextSnapshot {
        let actions: Vec<&HistoryEvent> =
            self.history.iter().filter(|e| e.is_worker_action()).collect();
        let skip = actions.len().saturating_sub(RECENT_ACTIONS);
        ContextSnapshot {
            case_reference: self.case_reference.clone(),
            workflow_phase: self.workflow.phase.clone(),
            completed_steps: self.workflow.completed_steps.clone(),
            pending_steps: self.workflow.pending_steps.clone(),
            recent_messages: self.unread_for(worker),
            shared_data_keys: self.data_keys(),
            recent_actions: actions.into_iter().skip(skip).cloned().collect(),
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// The durable snapshot: full data and workflow state, the last 100
    /// history events and the last 50 messages.
    pub fn snapshot(&self) -> CaseSnapshot {
        CaseSnapshot {
            case_reference: self.case_reference.clone(),
            last_updated: Utc::now(),
            data: self.data.clone(),
            workflow_state: self.workflow.clone(),
            history: tail(&self.history, HISTORY_PERSIST_CAP),
            messages: tail(&self.messages, MESSAGE_PERSIST_CAP),
        }
    }

    fn load(&mut self) {
        let Some(path) = &self.storage_path else { return };
        match json_file::read_json::<CaseSnapshot>(path) {
            Ok(Some(snapshot)) => {
                log::debug!(
                    "[{}] loaded case state from {}",
                    self.case_reference,
                    path.display()
                );
                self.data = snapshot.data;
                self.workflow = snapshot.workflow_state;
                self.history = snapshot.history;
                self.messages = snapshot.messages;
            }
            Ok(None) => {}
            Err(err) => {
                log::warn!(
                    "[{}] could not load case state ({}); starting empty",
                    self.case_reference,
                    err
                );
            }
        }
    }

    fn persist(&self) {
        let Some(path) = &self.storage_path else { return };
        if let Err(err) = json_file::write_json(path, &self.snapshot()) {
            log::error!(
                "[{}] failed to persist case state to {}: {}",
                self.case_reference,
                path.display(),
                err
            );
        }
    }
}

fn tail<T: Clone>(items: &[T], cap: usize) -> Vec<T> {
    let skip = items.len().saturating_sub(cap);
    items[skip..].to_vec()
}

/// Truncated rendering of a value for the audit trail.
fn value_summary(value: &Value) -> String {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    truncate_chars(&rendered, VALUE_SUMMARY_CHARS)
}
