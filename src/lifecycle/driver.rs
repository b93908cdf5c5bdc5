//! The phase driver.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::blackboard::Blackboard;
use crate::oracle::{decode_reply, Oracle, OracleReply};

use super::phases::{
    ActionPlan, Execution, Observation, Reflection, TaskSpec, WorkerReport,
};
use super::worker::Worker;

/// Drives a worker through one task:
/// OBSERVE, REASON, PLAN, ACT, REFLECT, RECORD.
///
/// An error from any capability method aborts the remaining phases and
/// yields a failed report instead of propagating; whatever earlier phases
/// already wrote to the blackboard stays written. RECORD always runs, on
/// the failure path too.
pub struct Lifecycle {
    oracle: Arc<dyn Oracle>,
}

impl Lifecycle {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// Run `worker` against `task`.
    pub fn execute(
        &self,
        worker: &dyn Worker,
        task: TaskSpec,
        blackboard: &mut Blackboard,
    ) -> WorkerReport {
        let agent = worker.name().to_string();
        let action = task.action.clone();
        log::info!("[{}] {} starting '{}'", blackboard.case_reference(), agent, action);

        let observation = observe(&agent, task.clone(), blackboard);
        let report = match self.run_phases(worker, observation, blackboard) {
            Ok(report) => report,
            Err(err) => {
                log::error!(
                    "[{}] {} failed during '{}': {}",
                    blackboard.case_reference(),
                    agent,
                    action,
                    err
                );
                WorkerReport::failed(&agent, task, err.to_string())
            }
        };

        let summary = report_summary(&report);
        blackboard.record_worker_action(&agent, &action, report.status, &summary);
        report
    }

    fn run_phases(
        &self,
        worker: &dyn Worker,
        observation: Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<WorkerReport> {
        let reasoning = worker.reason(&observation, blackboard)?;
        let plan = worker.plan(&reasoning, &observation, blackboard)?;
        let execution = worker.act(&plan, &observation, blackboard)?;
        let reflection = self.reflect(worker, &plan, &execution, blackboard);

        Ok(WorkerReport {
            status: execution.status,
            agent: worker.name().to_string(),
            next_steps: reflection.suggestions.clone(),
            observation: Some(observation),
            reasoning: Some(reasoning),
            plan: Some(plan),
            execution: Some(execution),
            reflection: Some(reflection),
            error: None,
            task: None,
        })
    }

    /// Shared REFLECT phase. Never fails: when the oracle cannot produce a
    /// verdict, a deterministic one is derived from the execution status.
    /// Every notify entry posts a mailbox message before this returns.
    fn reflect(
        &self,
        worker: &dyn Worker,
        plan: &ActionPlan,
        execution: &Execution,
        blackboard: &mut Blackboard,
    ) -> Reflection {
        let verdict = match self.oracle.complete(&reflection_prompt(worker, plan, execution)) {
            Ok(reply) => match decode_reply(&reply) {
                OracleReply::Object(value) => Reflection::from_verdict(&value, execution.status),
                OracleReply::Raw(_) => {
                    log::debug!("{}: reflection reply was not decodable", worker.name());
                    Reflection::fallback(execution.status, "reflection reply was not decodable")
                }
            },
            Err(err) => {
                log::warn!("{}: reflection oracle call failed: {}", worker.name(), err);
                Reflection::fallback(
                    execution.status,
                    &format!("reflection unavailable: {}", err),
                )
            }
        };

        for (recipient, message) in &verdict.notify {
            blackboard.post_message(worker.name(), recipient, message, None);
        }
        verdict
    }
}

/// OBSERVE: the task, a context snapshot and the unread mailbox. Pure read;
/// nothing is marked read.
fn observe(worker: &str, task: TaskSpec, blackboard: &mut Blackboard) -> Observation {
    Observation {
        context: blackboard.context_for(worker),
        messages: blackboard.messages_for(worker, false),
        task,
        observed_at: Utc::now(),
    }
}

fn reflection_prompt(worker: &dyn Worker, plan: &ActionPlan, execution: &Execution) -> String {
    format!(
        "You are {role}. Reflect on the work you just finished.\n\n\
         Planned:\n{plan}\n\n\
         Outcome:\n{outcome}\n\n\
         Respond with JSON:\n\
         {{\"success\": true/false, \"quality_score\": 0.0-1.0, \"issues\": [], \
         \"suggestions\": [], \"notify_agents\": {{\"agent_name\": \"message\"}}}}",
        role = worker.role(),
        plan = pretty(plan),
        outcome = pretty(execution),
    )
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn report_summary(report: &WorkerReport) -> String {
    match (&report.execution, &report.error) {
        (Some(execution), _) => execution.summary.clone(),
        (None, Some(error)) => error.clone(),
        (None, None) => report.status.to_string(),
    }
}
