//! Classification: document categories via the oracle.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::blackboard::Blackboard;
use crate::lifecycle::{
    ActionPlan, Execution, ExecutionStatus, Observation, PlannedAction, Reasoning, Worker,
};
use crate::oracle::{decode_reply, Oracle, OracleReply};
use crate::settings::Settings;
use crate::stage::{DocumentRecord, Stage, StageManager};

/// Assigns a category to every document waiting in the intake stage and
/// advances it to classification.
///
/// An unusable oracle verdict is soft: the document is marked
/// `category: unknown` and still advances. Only filesystem failures leave
/// a document behind.
pub struct ClassificationWorker {
    settings: Settings,
    oracle: Arc<dyn Oracle>,
}

impl ClassificationWorker {
    pub fn new(settings: Settings, oracle: Arc<dyn Oracle>) -> Self {
        Self { settings, oracle }
    }

    fn stage(&self, blackboard: &Blackboard) -> anyhow::Result<StageManager> {
        Ok(StageManager::new(&self.settings, blackboard.case_reference())?)
    }

    /// Category verdict for one document. Never errors; undecodable or
    /// unavailable replies degrade to `category: unknown`.
    fn classify(&self, record: &DocumentRecord) -> Value {
        let filename = record.filename().unwrap_or(&record.document_id).to_string();
        let prompt = format!(
            "You are a document classifier for case processing.\n\n\
             Document: {filename}\nDocument id: {id}\n\n\
             Assign a category such as Identity Proof, Address Proof, \
             Financial Document, Regulatory Form or Other Document.\n\
             Respond with JSON:\n\
             {{\"category\": \"...\", \"confidence\": 0.0-1.0, \"reasoning\": \"...\"}}",
            filename = filename,
            id = record.document_id,
        );
        match self.oracle.complete(&prompt) {
            Ok(reply) => match decode_reply(&reply) {
                OracleReply::Object(verdict) => verdict,
                OracleReply::Raw(_) => {
                    log::warn!("undecodable classification verdict for {}", record.document_id);
                    json!({
                        "category": "unknown",
                        "confidence": 0.0,
                        "error": "verdict was not decodable",
                    })
                }
            },
            Err(err) => {
                log::warn!("classifier unavailable for {}: {}", record.document_id, err);
                json!({
                    "category": "unknown",
                    "confidence": 0.0,
                    "error": err.to_string(),
                })
            }
        }
    }
}

impl Worker for ClassificationWorker {
    fn name(&self) -> &str {
        "classification"
    }

    fn role(&self) -> &str {
        "Assigns a document category to everything waiting in intake"
    }

    fn reason(
        &self,
        _observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<Reasoning> {
        let stage = self.stage(blackboard)?;
        let waiting = stage.documents_in_stage(Stage::Intake)?;
        let mut reasoning = Reasoning::summarized(format!(
            "Classify {} documents waiting in intake",
            waiting.len()
        ));
        if waiting.is_empty() {
            reasoning.concerns.push("no documents are waiting in intake".to_string());
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
        let mut plan = ActionPlan::toward("Assign a category to each intake document");
        for record in stage.documents_in_stage(Stage::Intake)? {
            plan = plan.with_action(PlannedAction::new("classify_document").on(record.document_id));
        }
        Ok(plan)
    }

    fn act(
        &self,
        _plan: &ActionPlan,
        _observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<Execution> {
        let stage = self.stage(blackboard)?;
        let waiting = stage.documents_in_stage(Stage::Intake)?;
        if waiting.is_empty() {
            return Ok(Execution::completed("No documents awaiting classification"));
        }

        let case = blackboard.case_reference().to_string();
        let mut results = Vec::new();
        let mut failures = Vec::new();

        for record in &waiting {
            let verdict = self.classify(record);
            let category =
                verdict.get("category").and_then(Value::as_str).unwrap_or("unknown").to_string();

            let outcome = stage
                .record_stage_section(&record.document_id, "classification", verdict)
                .and_then(|_| stage.move_to_stage(&record.document_id, Stage::Classification));
            match outcome {
                Ok(_) => {
                    log::info!("[{}] classified {} as {}", case, record.document_id, category);
                    results.push(json!({
                        "document_id": record.document_id,
                        "category": category,
                        "status": "classified",
                    }));
                }
                Err(err) => {
                    log::error!("[{}] classification of {} failed: {}", case, record.document_id, err);
                    failures.push(format!("{}: {}", record.document_id, err));
                    results.push(json!({
                        "document_id": record.document_id,
                        "status": "failed",
                        "error": err.to_string(),
                    }));
                }
            }
        }

        blackboard.update("classification_results", json!(results), self.name());

        let status = if failures.is_empty() {
            ExecutionStatus::Completed
        } else if failures.len() == waiting.len() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Partial
        };
        Ok(Execution::completed(format!(
            "Classified {} of {} documents",
            waiting.len() - failures.len(),
            waiting.len()
        ))
        .with_status(status)
        .with_outputs(json!({ "results": results }))
        .with_errors(failures))
    }
}
