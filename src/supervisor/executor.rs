//! Single forward pass over a plan.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::blackboard::{Blackboard, WorkflowUpdate};
use crate::lifecycle::{ExecutionStatus, TaskSpec, WorkerReport};

use super::plan::{ErrorPolicy, Plan};
use super::Registry;

/// A step that was dispatched and failed, or could not be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepFailure {
    pub step_id: String,
    pub agent: String,
    pub error: String,
}

/// A step that never ran because a dependency had not completed when its
/// turn came.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedStep {
    pub step_id: String,
    pub unmet_dependencies: Vec<String>,
}

/// What one pass over a plan produced.
#[derive(Debug, Clone, Serialize)]
pub struct PassOutcome {
    /// `Completed` when no step failed, `Partial` otherwise.
    pub status: ExecutionStatus,
    pub completed: Vec<String>,
    pub failed: Vec<StepFailure>,
    pub skipped: Vec<SkippedStep>,
    /// Reports from every dispatched step, keyed by step id.
    pub reports: BTreeMap<String, WorkerReport>,
    /// True when a `fail_workflow` failure cut the pass short.
    pub halted: bool,
}

impl PassOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}

/// Walks a plan once, in order, dispatching each runnable step to the
/// worker registered under its `agent` name.
///
/// There is no second chance within a pass: a step whose dependencies are
/// unmet when its turn comes is skipped even if they would complete later,
/// and a `retry` step still gets exactly one attempt. Callers that want
/// another attempt run the plan again.
pub struct PlanExecutor<'a> {
    registry: &'a Registry,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    pub fn run(&self, plan: &Plan, blackboard: &mut Blackboard) -> PassOutcome {
        let case = blackboard.case_reference().to_string();
        let mut done: BTreeSet<String> = BTreeSet::new();
        let mut completed = Vec::new();
        let mut failed: Vec<StepFailure> = Vec::new();
        let mut skipped = Vec::new();
        let mut reports = BTreeMap::new();
        let mut halted = false;

        for step in &plan.steps {
            let unmet: Vec<String> = step
                .dependencies
                .iter()
                .filter(|dep| !done.contains(dep.as_str()))
                .cloned()
                .collect();
            if !unmet.is_empty() {
                log::warn!(
                    "[{}] skipping step '{}': waiting on {}",
                    case,
                    step.step_id,
                    unmet.join(", ")
                );
                skipped.push(SkippedStep {
                    step_id: step.step_id.clone(),
                    unmet_dependencies: unmet,
                });
                continue;
            }

            let Some(delegate) = self.registry.delegate(&step.agent) else {
                let error = format!("no worker registered as '{}'", step.agent);
                log::error!("[{}] step '{}' failed: {}", case, step.step_id, error);
                blackboard.update_workflow(WorkflowUpdate::failed(step.step_id.as_str()));
                failed.push(StepFailure {
                    step_id: step.step_id.clone(),
                    agent: step.agent.clone(),
                    error,
                });
                if step.error_policy == ErrorPolicy::FailWorkflow {
                    halted = true;
                    break;
                }
                continue;
            };

            log::info!(
                "[{}] step '{}': {} delegated to {}",
                case,
                step.step_id,
                step.action,
                step.agent
            );
            let task = TaskSpec::new(step.action.as_str())
                .with_parameters(step.parameters.clone())
                .with_step_id(step.step_id.as_str());
            let report = delegate.execute(task, blackboard);

            if report.status == ExecutionStatus::Failed {
                let error = step_error(&report);
                blackboard.update_workflow(WorkflowUpdate::failed(step.step_id.as_str()));
                failed.push(StepFailure {
                    step_id: step.step_id.clone(),
                    agent: step.agent.clone(),
                    error: error.clone(),
                });
                match step.error_policy {
                    ErrorPolicy::Retry => log::warn!(
                        "[{}] step '{}' failed its attempt: {}",
                        case,
                        step.step_id,
                        error
                    ),
                    ErrorPolicy::Skip => log::warn!(
                        "[{}] step '{}' failed, moving on: {}",
                        case,
                        step.step_id,
                        error
                    ),
                    ErrorPolicy::FailWorkflow => {
                        log::error!(
                            "[{}] step '{}' failed, halting the pass: {}",
                            case,
                            step.step_id,
                            error
                        );
                        halted = true;
                    }
                }
            } else {
                // Partial output still unblocks dependents.
                done.insert(step.step_id.clone());
                completed.push(step.step_id.clone());
                blackboard.update_workflow(WorkflowUpdate::completed(step.step_id.as_str()));
            }

            reports.insert(step.step_id.clone(), report);
            if halted {
                break;
            }
        }

        let status = if failed.is_empty() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Partial
        };
        PassOutcome { status, completed, failed, skipped, reports, halted }
    }
}

/// Best available failure message for a report.
fn step_error(report: &WorkerReport) -> String {
    if let Some(error) = &report.error {
        return error.clone();
    }
    if let Some(execution) = &report.execution {
        if let Some(first) = execution.errors.first() {
            return first.clone();
        }
    }
    "execution failed".to_string()
}
