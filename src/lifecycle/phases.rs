//! Typed records produced by each lifecycle phase.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blackboard::{AgentMessage, ContextSnapshot};

/// Outcome classification shared by executions, steps and whole passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Completed,
    Partial,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Partial => write!(f, "partial"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What the supervisor hands a worker for one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSpec {
    /// Verb the worker should perform, e.g. `validate_documents`.
    pub action: String,
    #[serde(default)]
    pub parameters: Value,
    /// Plan step this task came from, when plan-driven.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
}

impl TaskSpec {
    pub fn new(action: impl Into<String>) -> Self {
        Self { action: action.into(), parameters: Value::Null, step_id: None }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_step_id(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }
}

/// OBSERVE output: the task plus everything the worker could see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub task: TaskSpec,
    pub context: ContextSnapshot,
    /// Unread mail at observation time. Observing does not mark it read.
    pub messages: Vec<AgentMessage>,
    pub observed_at: DateTime<Utc>,
}

/// REASON output.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Reasoning {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approach: Option<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    /// Whatever else the analysis produced, verbatim.
    #[serde(default)]
    pub detail: Value,
}

impl Reasoning {
    pub fn summarized(summary: impl Into<String>) -> Self {
        Self { summary: summary.into(), ..Self::default() }
    }
}

/// One concrete thing ACT should do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedAction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

impl PlannedAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), target: None, parameters: Value::Null }
    }

    pub fn on(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// PLAN output.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActionPlan {
    pub objective: String,
    #[serde(default)]
    pub actions: Vec<PlannedAction>,
    #[serde(default)]
    pub detail: Value,
}

impl ActionPlan {
    pub fn toward(objective: impl Into<String>) -> Self {
        Self { objective: objective.into(), ..Self::default() }
    }

    pub fn with_action(mut self, action: PlannedAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// ACT output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub status: ExecutionStatus,
    pub summary: String,
    /// Structured results for downstream phases and the final report.
    #[serde(default)]
    pub outputs: Value,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Execution {
    pub fn completed(summary: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Completed,
            summary: summary.into(),
            outputs: Value::Null,
            errors: Vec::new(),
        }
    }

    pub fn failed(summary: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            summary: summary.into(),
            outputs: Value::Null,
            errors: vec![error.into()],
        }
    }

    pub fn with_status(mut self, status: ExecutionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_outputs(mut self, outputs: Value) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}

/// REFLECT output: the worker's self-assessment of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reflection {
    pub success: bool,
    /// Self-assessed quality in `[0, 1]`.
    pub quality_score: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Messages posted before reflection completes, keyed by recipient.
    #[serde(default)]
    pub notify: BTreeMap<String, String>,
}

impl Reflection {
    /// Deterministic verdict used when the oracle cannot produce one.
    /// Derived solely from the execution status.
    pub fn fallback(status: ExecutionStatus, reason: &str) -> Self {
        Self {
            success: status == ExecutionStatus::Completed,
            quality_score: 0.5,
            issues: vec![reason.to_string()],
            suggestions: vec!["Review execution manually".to_string()],
            notify: BTreeMap::new(),
        }
    }

    /// Tolerant read of an oracle verdict. Missing fields take the
    /// status-derived defaults; `quality_score` is clamped to `[0, 1]`.
    pub fn from_verdict(value: &Value, status: ExecutionStatus) -> Self {
        let mut notify = BTreeMap::new();
        if let Some(map) = value.get("notify_agents").and_then(Value::as_object) {
            for (agent, msg) in map {
                if let Some(text) = msg.as_str() {
                    notify.insert(agent.clone(), text.to_string());
                }
            }
        }
        Self {
            success: value
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(status == ExecutionStatus::Completed),
            quality_score: value
                .get("quality_score")
                .and_then(Value::as_f64)
                .unwrap_or(0.5)
                .clamp(0.0, 1.0),
            issues: string_list(value.get("issues")),
            suggestions: string_list(value.get("suggestions")),
            notify,
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Everything one lifecycle run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReport {
    pub status: ExecutionStatus,
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<Observation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ActionPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<Execution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<Reflection>,
    /// The reflection's suggestions, surfaced for the caller.
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The task, retained when the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskSpec>,
}

impl WorkerReport {
    /// Report for a run cut short by a phase error.
    pub fn failed(agent: &str, task: TaskSpec, error: String) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            agent: agent.to_string(),
            observation: None,
            reasoning: None,
            plan: None,
            execution: None,
            reflection: None,
            next_steps: Vec::new(),
            error: Some(error),
            task: Some(task),
        }
    }
}
