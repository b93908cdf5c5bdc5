//! Extraction: structured fields out of staged documents.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::blackboard::Blackboard;
use crate::lifecycle::{
    ActionPlan, Execution, ExecutionStatus, Observation, PlannedAction, Reasoning, Worker,
};
use crate::oracle::{decode_reply, Oracle, OracleReply};
use crate::settings::Settings;
use crate::stage::{Stage, StageManager};

/// Extracts structured fields from classified documents and advances them
/// to the extraction stage.
///
/// When the classification stage is empty the worker falls back to intake
/// documents, so extraction-first plans still make progress; such
/// documents skip the classification directory entirely, which the stage
/// tracker allows.
pub struct ExtractionWorker {
    settings: Settings,
    oracle: Arc<dyn Oracle>,
}

impl ExtractionWorker {
    pub fn new(settings: Settings, oracle: Arc<dyn Oracle>) -> Self {
        Self { settings, oracle }
    }

    fn stage(&self, blackboard: &Blackboard) -> anyhow::Result<StageManager> {
        Ok(StageManager::new(&self.settings, blackboard.case_reference())?)
    }

    /// Documents to extract from: the classification stage, or intake when
    /// nothing has been classified yet.
    fn workload(
        &self,
        stage: &StageManager,
    ) -> anyhow::Result<Vec<crate::stage::DocumentRecord>> {
        let classified = stage.documents_in_stage(Stage::Classification)?;
        if !classified.is_empty() {
            return Ok(classified);
        }
        Ok(stage.documents_in_stage(Stage::Intake)?)
    }

    /// Field verdict for one document. Undecodable or unavailable replies
    /// degrade to an empty field set.
    fn extract(&self, stage: &StageManager, document_id: &str, filename: &str) -> Value {
        let category = stage
            .document_metadata(document_id)
            .ok()
            .and_then(|m| {
                m.stage_section("classification")
                    .and_then(|c| c.get("category"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "unknown".to_string());
        let prompt = format!(
            "You are a document data extractor.\n\n\
             Document: {filename}\nCategory: {category}\n\n\
             Extract the key fields this kind of document carries \
             (names, dates, identifiers, amounts).\n\
             Respond with JSON:\n\
             {{\"fields\": {{\"field_name\": \"value\"}}, \"summary\": \"...\"}}",
            filename = filename,
            category = category,
        );
        match self.oracle.complete(&prompt) {
            Ok(reply) => match decode_reply(&reply) {
                OracleReply::Object(verdict) => verdict,
                OracleReply::Raw(_) => {
                    log::warn!("undecodable extraction verdict for {}", document_id);
                    json!({ "fields": {}, "error": "verdict was not decodable" })
                }
            },
            Err(err) => {
                log::warn!("extractor unavailable for {}: {}", document_id, err);
                json!({ "fields": {}, "error": err.to_string() })
            }
        }
    }
}

impl Worker for ExtractionWorker {
    fn name(&self) -> &str {
        "extraction"
    }

    fn role(&self) -> &str {
        "Extracts structured fields from classified documents"
    }

    fn reason(
        &self,
        _observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<Reasoning> {
        let stage = self.stage(blackboard)?;
        let workload = self.workload(&stage)?;
        let mut reasoning =
            Reasoning::summarized(format!("Extract fields from {} documents", workload.len()));
        if workload.is_empty() {
            reasoning.concerns.push("no documents are ready for extraction".to_string());
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
        let mut plan = ActionPlan::toward("Extract key fields from each staged document");
        for record in self.workload(&stage)? {
            plan = plan.with_action(PlannedAction::new("extract_fields").on(record.document_id));
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
        let workload = self.workload(&stage)?;
        if workload.is_empty() {
            return Ok(Execution::completed("No documents awaiting extraction"));
        }

        let case = blackboard.case_reference().to_string();
        let mut results = Vec::new();
        let mut failures = Vec::new();

        for record in &workload {
            let filename = record.filename().unwrap_or(&record.document_id).to_string();
            let verdict = self.extract(&stage, &record.document_id, &filename);

            let outcome = stage
                .record_stage_section(&record.document_id, "extraction", verdict)
                .and_then(|_| stage.move_to_stage(&record.document_id, Stage::Extraction));
            match outcome {
                Ok(_) => {
                    log::info!("[{}] extracted fields from {}", case, record.document_id);
                    results.push(json!({
                        "document_id": record.document_id,
                        "status": "extracted",
                    }));
                }
                Err(err) => {
                    log::error!("[{}] extraction of {} failed: {}", case, record.document_id, err);
                    failures.push(format!("{}: {}", record.document_id, err));
                    results.push(json!({
                        "document_id": record.document_id,
                        "status": "failed",
                        "error": err.to_string(),
                    }));
                }
            }
        }

        blackboard.update("extraction_results", json!(results), self.name());

        let status = if failures.is_empty() {
            ExecutionStatus::Completed
        } else if failures.len() == workload.len() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Partial
        };
        Ok(Execution::completed(format!(
            "Extracted fields from {} of {} documents",
            workload.len() - failures.len(),
            workload.len()
        ))
        .with_status(status)
        .with_outputs(json!({ "results": results }))
        .with_errors(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Lifecycle, TaskSpec};
    use crate::oracle::ScriptedOracle;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn seeded_case(root: &Path, case: &str, count: usize) -> (Settings, StageManager) {
        let settings = Settings::new(root.join("docs"));
        let stage = StageManager::new(&settings, case).unwrap();
        for n in 1..=count {
            let source = root.join(format!("doc{}.pdf", n));
            fs::write(&source, b"%PDF").unwrap();
            let id = format!("{}_DOC_{:03}", case, n);
            stage.add_document(&id, &format!("{}.pdf", id), &source, None).unwrap();
        }
        (settings, stage)
    }

    fn run(
        settings: &Settings,
        oracle: Arc<ScriptedOracle>,
        blackboard: &mut Blackboard,
    ) -> crate::lifecycle::WorkerReport {
        let worker = ExtractionWorker::new(settings.clone(), oracle.clone());
        Lifecycle::new(oracle).execute(&worker, TaskSpec::new("extract_data"), blackboard)
    }

    #[test]
    fn test_extracts_from_classified_documents() {
        let root = tempdir().unwrap();
        let (settings, stage) = seeded_case(root.path(), "C_EXT_1", 1);
        stage
            .update_document_metadata(
                "C_EXT_1_DOC_001",
                json!({"classification": {"category": "Financial Document"}})
                    .as_object()
                    .unwrap(),
            )
            .unwrap();
        stage.move_to_stage("C_EXT_1_DOC_001", Stage::Classification).unwrap();
        let mut blackboard = Blackboard::in_memory("C_EXT_1");
        let oracle = Arc::new(ScriptedOracle::new([
            r#"{"fields": {"iban": "DE02", "total": "120.00"}, "summary": "bank statement"}"#,
        ]));

        let report = run(&settings, oracle, &mut blackboard);

        assert_eq!(report.status, ExecutionStatus::Completed);
        assert_eq!(stage.documents_in_stage(Stage::Extraction).unwrap().len(), 1);
        let metadata = stage.document_metadata("C_EXT_1_DOC_001").unwrap();
        assert_eq!(metadata.stage_section("extraction").unwrap()["fields"]["iban"], "DE02");
        // Classification results are still there.
        assert_eq!(
            metadata.stage_section("classification").unwrap()["category"],
            "Financial Document"
        );
    }

    #[test]
    fn test_falls_back_to_intake_when_nothing_is_classified() {
        let root = tempdir().unwrap();
        let (settings, stage) = seeded_case(root.path(), "C_EXT_2", 1);
        let mut blackboard = Blackboard::in_memory("C_EXT_2");
        let oracle = Arc::new(ScriptedOracle::new([r#"{"fields": {}}"#]));

        let report = run(&settings, oracle, &mut blackboard);

        assert_eq!(report.status, ExecutionStatus::Completed);
        assert!(stage.documents_in_stage(Stage::Intake).unwrap().is_empty());
        assert_eq!(stage.documents_in_stage(Stage::Extraction).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_workload_is_a_completed_noop() {
        let root = tempdir().unwrap();
        let (settings, _stage) = seeded_case(root.path(), "C_EXT_3", 0);
        let mut blackboard = Blackboard::in_memory("C_EXT_3");
        let oracle = Arc::new(ScriptedOracle::default());

        let report = run(&settings, oracle, &mut blackboard);

        assert_eq!(report.status, ExecutionStatus::Completed);
        assert!(blackboard.get("extraction_results").is_none());
    }
}
