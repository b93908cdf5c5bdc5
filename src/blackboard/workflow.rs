//! Workflow phase tracking.

use serde::{Deserialize, Serialize};

/// Where a case stands in its workflow.
///
/// The step lists keep insertion order with set semantics: inserting an id
/// that is already present is a no-op, and completing a step withdraws it
/// from `pending_steps`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowState {
    pub phase: String,
    #[serde(default)]
    pub completed_steps: Vec<String>,
    #[serde(default)]
    pub pending_steps: Vec<String>,
    #[serde(default)]
    pub failed_steps: Vec<String>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            phase: "initialization".to_string(),
            completed_steps: Vec::new(),
            pending_steps: Vec::new(),
            failed_steps: Vec::new(),
        }
    }
}

impl WorkflowState {
    /// Apply one batched change.
    pub fn apply(&mut self, update: WorkflowUpdate) {
        if let Some(phase) = update.phase {
            self.phase = phase;
        }
        if let Some(step) = update.completed_step {
            push_unique(&mut self.completed_steps, &step);
            self.pending_steps.retain(|s| s != &step);
        }
        if let Some(step) = update.pending_step {
            push_unique(&mut self.pending_steps, &step);
        }
        if let Some(step) = update.failed_step {
            push_unique(&mut self.failed_steps, &step);
        }
    }

    /// Counts for quick status rendering.
    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            phase: self.phase.clone(),
            completed: self.completed_steps.len(),
            pending: self.pending_steps.len(),
            failed: self.failed_steps.len(),
        }
    }
}

fn push_unique(list: &mut Vec<String>, step: &str) {
    if !list.iter().any(|s| s == step) {
        list.push(step.to_string());
    }
}

/// One batched change to the workflow tracker. All fields are optional and
/// combine freely in a single call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowUpdate {
    pub phase: Option<String>,
    pub completed_step: Option<String>,
    pub pending_step: Option<String>,
    pub failed_step: Option<String>,
}

impl WorkflowUpdate {
    pub fn phase(phase: impl Into<String>) -> Self {
        Self { phase: Some(phase.into()), ..Self::default() }
    }

    pub fn completed(step: impl Into<String>) -> Self {
        Self { completed_step: Some(step.into()), ..Self::default() }
    }

    pub fn pending(step: impl Into<String>) -> Self {
        Self { pending_step: Some(step.into()), ..Self::default() }
    }

    pub fn failed(step: impl Into<String>) -> Self {
        Self { failed_step: Some(step.into()), ..Self::default() }
    }

    /// Also change the phase with this update.
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }
}

/// Counts of steps by disposition, plus the current phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSummary {
    pub phase: String,
    pub completed: usize,
    pub pending: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phase_is_initialization() {
        assert_eq!(WorkflowState::default().phase, "initialization");
    }

    #[test]
    fn test_completing_a_step_is_idempotent() {
        let mut state = WorkflowState::default();
        state.apply(WorkflowUpdate::completed("intake"));
        state.apply(WorkflowUpdate::completed("intake"));
        assert_eq!(state.completed_steps, vec!["intake"]);
    }

    #[test]
    fn test_completing_withdraws_from_pending() {
        let mut state = WorkflowState::default();
        state.apply(WorkflowUpdate::pending("intake"));
        state.apply(WorkflowUpdate::pending("extraction"));
        state.apply(WorkflowUpdate::completed("intake"));
        assert_eq!(state.pending_steps, vec!["extraction"]);
        assert_eq!(state.completed_steps, vec!["intake"]);
    }

    #[test]
    fn test_batched_update() {
        let mut state = WorkflowState::default();
        state.apply(WorkflowUpdate::completed("intake").with_phase("execution"));
        assert_eq!(state.phase, "execution");
        assert_eq!(state.completed_steps, vec!["intake"]);
    }

    #[test]
    fn test_failed_steps_accumulate_uniquely() {
        let mut state = WorkflowState::default();
        state.apply(WorkflowUpdate::failed("classify"));
        state.apply(WorkflowUpdate::failed("classify"));
        assert_eq!(state.failed_steps, vec!["classify"]);
    }

    #[test]
    fn test_summary_counts() {
        let mut state = WorkflowState::default();
        state.apply(WorkflowUpdate::pending("a"));
        state.apply(WorkflowUpdate::pending("b"));
        state.apply(WorkflowUpdate::completed("a"));
        let summary = state.summary();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.failed, 0);
    }
}
