//! Completion: final verification, case summary, notification.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::blackboard::{Blackboard, BROADCAST};
use crate::lifecycle::{
    ActionPlan, Execution, ExecutionStatus, Observation, PlannedAction, Reasoning, Worker,
};
use crate::oracle::{decode_reply, Oracle};
use crate::settings::Settings;
use crate::stage::{Stage, StageManager};

/// Sections a fully processed document is expected to carry.
const EXPECTED_SECTIONS: [&str; 2] = ["classification", "extraction"];

/// Verifies extracted documents, moves them to the processed stage, writes
/// a case summary and broadcasts that the case is done.
pub struct CompletionWorker {
    settings: Settings,
    oracle: Arc<dyn Oracle>,
}

impl CompletionWorker {
    pub fn new(settings: Settings, oracle: Arc<dyn Oracle>) -> Self {
        Self { settings, oracle }
    }

    fn stage(&self, blackboard: &Blackboard) -> anyhow::Result<StageManager> {
        Ok(StageManager::new(&self.settings, blackboard.case_reference())?)
    }

    /// Names of expected sections the sidecar does not carry.
    fn missing_sections(&self, stage: &StageManager, document_id: &str) -> Vec<String> {
        match stage.document_metadata(document_id) {
            Ok(metadata) => EXPECTED_SECTIONS
                .iter()
                .filter(|section| metadata.stage_section(section).is_none())
                .map(|s| s.to_string())
                .collect(),
            Err(_) => EXPECTED_SECTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Ask the oracle for a case summary and publish it. Soft on every
    /// failure path: an unusable reply is stored raw, an outage skips the
    /// summary.
    fn summarize_case(&self, processed: &[Value], blackboard: &mut Blackboard) {
        let case = blackboard.case_reference().to_string();
        let prompt = format!(
            "You are wrapping up the processing of case {case}.\n\n\
             Processed documents:\n{documents}\n\n\
             Write a short completion summary.\n\
             Respond with JSON:\n\
             {{\"summary\": \"...\", \"document_count\": N, \"concerns\": []}}",
            case = case,
            documents = serde_json::to_string_pretty(processed)
                .unwrap_or_else(|_| "[]".to_string()),
        );
        match self.oracle.complete(&prompt) {
            Ok(reply) => {
                let value = decode_reply(&reply).into_value();
                blackboard.update("case_summary", value, self.name());
            }
            Err(err) => {
                log::warn!("[{}] case summary unavailable: {}", case, err);
            }
        }
    }
}

impl Worker for CompletionWorker {
    fn name(&self) -> &str {
        "completion"
    }

    fn role(&self) -> &str {
        "Verifies processed documents, summarizes the case and notifies the team"
    }

    fn reason(
        &self,
        _observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<Reasoning> {
        let stage = self.stage(blackboard)?;
        let ready = stage.documents_in_stage(Stage::Extraction)?;
        let mut reasoning = Reasoning::summarized(format!(
            "Finalize {} documents that finished extraction",
            ready.len()
        ));
        if ready.is_empty() {
            reasoning.concerns.push("no documents are ready to finalize".to_string());
        }
        Ok(reasoning)
    }

    fn plan(
        &self,
        _reasoning: &Reasoning,
        _observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<ActionPlan> {
        let stage = self.stage(blackboard)?;
        let mut plan = ActionPlan::toward("Finalize extracted documents and close out the case");
        for record in stage.documents_in_stage(Stage::Extraction)? {
            plan = plan.with_action(PlannedAction::new("finalize_document").on(record.document_id));
        }
        plan = plan.with_action(PlannedAction::new("summarize_case"));
        Ok(plan)
    }

    fn act(
        &self,
        _plan: &ActionPlan,
        _observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<Execution> {
        let stage = self.stage(blackboard)?;
        let ready = stage.documents_in_stage(Stage::Extraction)?;
        if ready.is_empty() {
            return Ok(Execution::completed("No documents awaiting completion"));
        }

        let case = blackboard.case_reference().to_string();
        let mut processed = Vec::new();
        let mut failures = Vec::new();

        for record in &ready {
            let missing = self.missing_sections(&stage, &record.document_id);
            let verified = missing.is_empty();
            let mut updates = serde_json::Map::new();
            updates.insert(
                "completion".to_string(),
                json!({ "verified": verified, "missing_sections": missing }),
            );
            if !verified {
                let warnings: Vec<String> =
                    missing.iter().map(|section| format!("missing {} results", section)).collect();
                updates.insert("warnings".to_string(), json!(warnings));
            }
            let outcome = stage
                .update_document_metadata(&record.document_id, &updates)
                .and_then(|_| stage.move_to_stage(&record.document_id, Stage::Processed));
            match outcome {
                Ok(_) => {
                    log::info!("[{}] finalized {}", case, record.document_id);
                    processed.push(json!({
                        "document_id": record.document_id,
                        "verified": verified,
                    }));
                }
                Err(err) => {
                    log::error!("[{}] finalizing {} failed: {}", case, record.document_id, err);
                    failures.push(format!("{}: {}", record.document_id, err));
                }
            }
        }

        if !processed.is_empty() {
            let index = stage.index()?;
            if index.documents.iter().all(|d| d.stage == Stage::Processed) {
                stage.set_workflow_stage(Stage::Processed)?;
            }
            self.summarize_case(&processed, blackboard);
            blackboard.post_message(
                self.name(),
                BROADCAST,
                &format!("Case processing finished: {} documents processed", processed.len()),
                None,
            );
        }

        let status = if failures.is_empty() {
            ExecutionStatus::Completed
        } else if processed.is_empty() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Partial
        };
        Ok(Execution::completed(format!(
            "Finalized {} of {} documents",
            processed.len(),
            ready.len()
        ))
        .with_status(status)
        .with_outputs(json!({ "processed": processed }))
        .with_errors(failures))
    }
}
