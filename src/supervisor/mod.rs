//! Plan-driven coordination of a worker team.
//!
//! The supervisor turns a free-form request into an execution plan, asking
//! the oracle first and falling back to a fixed default workflow when the
//! reply yields nothing usable. The plan then gets exactly one forward pass
//! through [`PlanExecutor`], which dispatches each step to a registered
//! worker and applies the step's error policy when it fails. Progress and
//! the adopted plan land on the case blackboard as they happen, so a
//! crashed run leaves an inspectable trail.

mod executor;
mod plan;

pub use executor::{PassOutcome, PlanExecutor, SkippedStep, StepFailure};
pub use plan::{default_workflow, ErrorPolicy, Plan, PlanSource, PlanStep};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::blackboard::{Blackboard, WorkflowUpdate};
use crate::lifecycle::{ExecutionStatus, Lifecycle, TaskSpec, Worker, WorkerReport};
use crate::oracle::{decode_array, decode_reply, Oracle, OracleReply};

/// Anything the executor can hand a step to.
///
/// Workers registered through [`Registry::register_worker`] run the full
/// lifecycle; tests register leaner stand-ins directly.
pub trait Delegate: Send + Sync {
    fn execute(&self, task: TaskSpec, blackboard: &mut Blackboard) -> WorkerReport;
}

/// Runs a worker through the phased lifecycle for every task it receives.
struct LifecycleDelegate<W: Worker> {
    worker: W,
    lifecycle: Lifecycle,
}

impl<W: Worker> Delegate for LifecycleDelegate<W> {
    fn execute(&self, task: TaskSpec, blackboard: &mut Blackboard) -> WorkerReport {
        self.lifecycle.execute(&self.worker, task, blackboard)
    }
}

struct Registration {
    description: String,
    delegate: Arc<dyn Delegate>,
}

/// Name-keyed worker roster. Plan steps refer to workers by these names.
#[derive(Default)]
pub struct Registry {
    entries: BTreeMap<String, Registration>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a delegate under `name`, replacing any previous holder.
    pub fn register(&mut self, name: &str, description: &str, delegate: Arc<dyn Delegate>) {
        if self.entries.contains_key(name) {
            log::warn!("replacing registered worker '{}'", name);
        }
        self.entries.insert(
            name.to_string(),
            Registration { description: description.to_string(), delegate },
        );
    }

    /// Register a worker under its own name, wrapped in the lifecycle.
    pub fn register_worker<W: Worker + 'static>(&mut self, worker: W, oracle: Arc<dyn Oracle>) {
        let name = worker.name().to_string();
        let description = worker.role().to_string();
        let delegate = LifecycleDelegate { worker, lifecycle: Lifecycle::new(oracle) };
        self.register(&name, &description, Arc::new(delegate));
    }

    pub fn delegate(&self, name: &str) -> Option<Arc<dyn Delegate>> {
        self.entries.get(name).map(|r| r.delegate.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// One `name: description` line per registered worker, for prompts.
    pub fn roster(&self) -> String {
        self.entries
            .iter()
            .map(|(name, r)| format!("- {}: {}", name, r.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The record a supervisor run leaves behind.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub case_reference: String,
    pub request: String,
    pub plan: Plan,
    pub outcome: PassOutcome,
}

impl RunReport {
    pub fn status(&self) -> ExecutionStatus {
        self.outcome.status
    }

    /// Human-readable rendering of what the run did.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Case {}: {} ({} plan, {} steps)",
            self.case_reference,
            self.outcome.status,
            match self.plan.source {
                PlanSource::Oracle => "planned",
                PlanSource::DefaultWorkflow => "default",
            },
            self.plan.steps.len()
        )];
        if !self.outcome.completed.is_empty() {
            lines.push(format!("  completed: {}", self.outcome.completed.join(", ")));
        }
        for failure in &self.outcome.failed {
            lines.push(format!("  failed: {} ({})", failure.step_id, failure.error));
        }
        for skip in &self.outcome.skipped {
            lines.push(format!(
                "  skipped: {} (waiting on {})",
                skip.step_id,
                skip.unmet_dependencies.join(", ")
            ));
        }
        if self.outcome.halted {
            lines.push("  halted before the remaining steps".to_string());
        }
        lines.join("\n")
    }
}

/// Coordinates one case: plans, executes, records.
pub struct Supervisor {
    oracle: Arc<dyn Oracle>,
    registry: Registry,
}

impl Supervisor {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle, registry: Registry::new() }
    }

    /// Add a worker to the team under its own name.
    pub fn register<W: Worker + 'static>(&mut self, worker: W) {
        self.registry.register_worker(worker, self.oracle.clone());
    }

    /// Add a custom delegate to the team.
    pub fn register_delegate(&mut self, name: &str, description: &str, delegate: Arc<dyn Delegate>) {
        self.registry.register(name, description, delegate);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle one request end to end: acquire a plan, adopt it onto the
    /// blackboard, run it once, and record the outcome.
    pub fn process_request(&self, request: &str, blackboard: &mut Blackboard) -> RunReport {
        let case = blackboard.case_reference().to_string();
        log::info!("[{}] processing request: {}", case, request);

        let plan = self.acquire_plan(request, blackboard);
        self.adopt_plan(&plan, blackboard);

        let outcome = PlanExecutor::new(&self.registry).run(&plan, blackboard);

        blackboard.record_worker_action(
            "supervisor",
            "process_request",
            outcome.status,
            &format!(
                "{} of {} steps completed, {} failed, {} skipped",
                outcome.completed.len(),
                plan.steps.len(),
                outcome.failed.len(),
                outcome.skipped.len()
            ),
        );

        RunReport { case_reference: case, request: request.to_string(), plan, outcome }
    }

    /// Ask the oracle for a plan; fall back to the default workflow when
    /// the reply is unusable or the oracle is unreachable.
    fn acquire_plan(&self, request: &str, blackboard: &Blackboard) -> Plan {
        let case = blackboard.case_reference();
        match self.oracle.complete(&self.planning_prompt(request, blackboard)) {
            Ok(reply) => {
                if let Some(value) = decode_array(&reply) {
                    if let Some(plan) = Plan::from_oracle_value(&value) {
                        return plan;
                    }
                }
                match decode_reply(&reply) {
                    OracleReply::Object(value) => {
                        if let Some(plan) = Plan::from_oracle_value(&value) {
                            return plan;
                        }
                        log::warn!(
                            "[{}] planner reply held no usable steps, using the default workflow",
                            case
                        );
                    }
                    OracleReply::Raw(_) => {
                        log::warn!(
                            "[{}] planner reply was not decodable, using the default workflow",
                            case
                        );
                    }
                }
            }
            Err(err) => {
                log::warn!("[{}] planner unavailable ({}), using the default workflow", case, err);
            }
        }
        default_workflow(blackboard.get("documents"))
    }

    /// Publish the plan and seed the workflow tracker with its steps.
    fn adopt_plan(&self, plan: &Plan, blackboard: &mut Blackboard) {
        match serde_json::to_value(plan) {
            Ok(value) => blackboard.update("execution_plan", value, "supervisor"),
            Err(err) => log::error!(
                "[{}] could not publish the plan: {}",
                blackboard.case_reference(),
                err
            ),
        }
        blackboard.update_workflow(WorkflowUpdate::phase("execution"));
        for step in &plan.steps {
            blackboard.update_workflow(WorkflowUpdate::pending(step.step_id.as_str()));
        }
    }

    fn planning_prompt(&self, request: &str, blackboard: &Blackboard) -> String {
        let context = blackboard.context_for("supervisor");
        format!(
            "You are the supervisor of a document processing team.\n\n\
             Case: {case}\n\
             Workflow phase: {phase}\n\
             Shared data keys: {keys}\n\n\
             Team:\n{roster}\n\n\
             Request: {request}\n\n\
             Respond with a JSON array of steps, in execution order. Each step:\n\
             {{\"step_id\": \"...\", \"agent\": \"<team member>\", \"action\": \"...\", \
             \"parameters\": {{}}, \"dependencies\": [], \
             \"error_policy\": \"retry|skip|fail_workflow\"}}",
            case = context.case_reference,
            phase = context.workflow_phase,
            keys = if context.shared_data_keys.is_empty() {
                "none".to_string()
            } else {
                context.shared_data_keys.join(", ")
            },
            roster = if self.registry.entries.is_empty() {
                "- (no workers registered)".to_string()
            } else {
                self.registry.roster()
            },
            request = request,
        )
    }
}
