//! Execution plans.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// How the executor responds when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Worth another attempt. The executor still makes exactly one attempt
    /// per pass; retrying means the caller re-runs the plan.
    Retry,
    /// Record the failure and keep going.
    #[default]
    Skip,
    /// Halt the pass; later steps are not visited.
    FailWorkflow,
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPolicy::Retry => write!(f, "retry"),
            ErrorPolicy::Skip => write!(f, "skip"),
            ErrorPolicy::FailWorkflow => write!(f, "fail_workflow"),
        }
    }
}

/// One delegated step of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    #[serde(default)]
    pub step_id: String,
    /// Registry name of the worker this step is delegated to.
    pub agent: String,
    pub action: String,
    #[serde(default)]
    pub parameters: Value,
    /// Step ids that must have completed earlier in the pass.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Advisory only; execution is always sequential.
    #[serde(default)]
    pub parallel_allowed: bool,
    #[serde(default, alias = "error_handling")]
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub description: String,
}

impl PlanStep {
    pub fn new(step_id: &str, agent: &str, action: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            agent: agent.to_string(),
            action: action.to_string(),
            parameters: Value::Null,
            dependencies: Vec::new(),
            parallel_allowed: false,
            error_policy: ErrorPolicy::default(),
            description: String::new(),
        }
    }

    pub fn depends_on(mut self, step_id: &str) -> Self {
        self.dependencies.push(step_id.to_string());
        self
    }

    pub fn on_error(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Where a plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// Decoded from an oracle reply.
    Oracle,
    /// The fixed fallback used when no usable plan could be decoded.
    DefaultWorkflow,
}

/// An ordered list of steps plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: Uuid,
    pub source: PlanSource,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(source: PlanSource, steps: Vec<PlanStep>) -> Self {
        Self { plan_id: Uuid::new_v4(), source, created_at: Utc::now(), steps }
    }

    /// Read a plan out of decoded oracle output: either a top-level array
    /// of steps, or an object carrying one under `steps` or `plan`.
    /// Elements that do not decode as steps are discarded; blank step ids
    /// are filled positionally. Returns `None` when no usable step remains.
    pub fn from_oracle_value(value: &Value) -> Option<Self> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(map) => map
                .get("steps")
                .or_else(|| map.get("plan"))
                .and_then(Value::as_array)?,
            _ => return None,
        };

        let mut steps = Vec::new();
        for item in items {
            match serde_json::from_value::<PlanStep>(item.clone()) {
                Ok(step) => steps.push(step),
                Err(err) => log::warn!("discarding undecodable plan step: {}", err),
            }
        }
        if steps.is_empty() {
            return None;
        }

        for (position, step) in steps.iter_mut().enumerate() {
            if step.step_id.trim().is_empty() {
                step.step_id = format!("step_{}", position + 1);
            }
        }
        Some(Self::new(PlanSource::Oracle, steps))
    }
}

/// The fixed fallback workflow, chosen by whether any documents are known
/// for the case: a lone status check when there are none, otherwise intake
/// followed by extraction and classification gated on it.
pub fn default_workflow(documents: Option<&Value>) -> Plan {
    let sources: Vec<Value> = documents
        .and_then(Value::as_array)
        .map(|items| items.to_vec())
        .unwrap_or_default();

    if sources.is_empty() {
        return Plan::new(
            PlanSource::DefaultWorkflow,
            vec![PlanStep::new("status_check", "intake", "check_status")
                .on_error(ErrorPolicy::Skip)
                .describe("Report current case status")],
        );
    }

    Plan::new(
        PlanSource::DefaultWorkflow,
        vec![
            PlanStep::new("intake", "intake", "validate_documents")
                .with_parameters(serde_json::json!({ "documents": sources }))
                .on_error(ErrorPolicy::FailWorkflow)
                .describe("Validate and register incoming documents"),
            PlanStep::new("extraction", "extraction", "extract_data")
                .depends_on("intake")
                .on_error(ErrorPolicy::Skip)
                .describe("Extract fields from validated documents"),
            PlanStep::new("classification", "classification", "classify_documents")
                .depends_on("intake")
                .on_error(ErrorPolicy::Retry)
                .describe("Classify validated documents"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_from_array() {
        let value = json!([
            {"step_id": "a", "agent": "intake", "action": "validate_documents"},
            {"step_id": "b", "agent": "extraction", "action": "extract_data",
             "dependencies": ["a"], "error_handling": "fail_workflow"}
        ]);
        let plan = Plan::from_oracle_value(&value).unwrap();
        assert_eq!(plan.source, PlanSource::Oracle);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].dependencies, vec!["a"]);
        // The original field name decodes as an alias.
        assert_eq!(plan.steps[1].error_policy, ErrorPolicy::FailWorkflow);
    }

    #[test]
    fn test_plan_from_object_with_steps_key() {
        let value = json!({"steps": [{"agent": "intake", "action": "check_status"}]});
        let plan = Plan::from_oracle_value(&value).unwrap();
        assert_eq!(plan.steps.len(), 1);
        // Blank id filled positionally; defaults applied.
        assert_eq!(plan.steps[0].step_id, "step_1");
        assert_eq!(plan.steps[0].error_policy, ErrorPolicy::Skip);
        assert!(!plan.steps[0].parallel_allowed);
    }

    #[test]
    fn test_plan_discards_malformed_steps() {
        let value = json!([
            {"agent": "intake", "action": "check_status"},
            {"not_a": "step"},
            42
        ]);
        let plan = Plan::from_oracle_value(&value).unwrap();
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn test_plan_requires_some_usable_step() {
        assert!(Plan::from_oracle_value(&json!({"raw_response": "no idea"})).is_none());
        assert!(Plan::from_oracle_value(&json!([{"bogus": true}])).is_none());
        assert!(Plan::from_oracle_value(&json!("just text")).is_none());
    }

    #[test]
    fn test_default_workflow_without_documents() {
        let plan = default_workflow(None);
        assert_eq!(plan.source, PlanSource::DefaultWorkflow);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].agent, "intake");
        assert_eq!(plan.steps[0].action, "check_status");
    }

    #[test]
    fn test_default_workflow_with_documents() {
        let documents = json!(["/in/a.pdf", "/in/b.pdf"]);
        let plan = default_workflow(Some(&documents));
        let ids: Vec<&str> = plan.steps.iter().map(|s| s.step_id.as_str()).collect();
        assert_eq!(ids, vec!["intake", "extraction", "classification"]);
        assert_eq!(plan.steps[0].error_policy, ErrorPolicy::FailWorkflow);
        assert_eq!(plan.steps[0].parameters["documents"], documents);
        assert_eq!(plan.steps[1].dependencies, vec!["intake"]);
        assert_eq!(plan.steps[2].error_policy, ErrorPolicy::Retry);
    }
}
