//! Intake: mechanical validation and registration of incoming files.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::blackboard::Blackboard;
use crate::lifecycle::{
    ActionPlan, Execution, ExecutionStatus, Observation, PlannedAction, Reasoning, Worker,
};
use crate::oracle::{decode_reply, Oracle, OracleReply};
use crate::settings::Settings;
use crate::stage::StageManager;
use crate::utilities::ids;

/// Validates offered files against the intake rules and copies the
/// acceptable ones into the intake stage under fresh document ids.
///
/// The oracle contributes a batch assessment during REASON; validation
/// itself is deterministic and runs the same with or without it.
pub struct IntakeWorker {
    settings: Settings,
    oracle: Arc<dyn Oracle>,
}

impl IntakeWorker {
    pub fn new(settings: Settings, oracle: Arc<dyn Oracle>) -> Self {
        Self { settings, oracle }
    }

    fn stage(&self, blackboard: &Blackboard) -> anyhow::Result<StageManager> {
        Ok(StageManager::new(&self.settings, blackboard.case_reference())?)
    }

    /// File paths offered for intake: task parameters first, the shared
    /// `documents` entry as fallback.
    fn offered_sources(&self, observation: &Observation, blackboard: &Blackboard) -> Vec<String> {
        let from_task = observation.task.parameters.get("documents");
        let list = from_task.or_else(|| blackboard.get("documents"));
        list.and_then(Value::as_array)
            .map(|items| {
                items.iter().filter_map(Value::as_str).map(str::to_string).collect()
            })
            .unwrap_or_default()
    }

    /// Batch assessment from the oracle, `None` when the call fails or the
    /// reply carries no object.
    fn assessment(&self, case: &str, sources: &[String]) -> Option<Value> {
        let prompt = format!(
            "You are the intake specialist for document case processing.\n\n\
             Case: {case}\nOffered files:\n{listing}\n\n\
             Intake rules: extensions {extensions}, at most {limit} bytes per file.\n\n\
             Assess the batch before validation. Respond with JSON:\n\
             {{\"summary\": \"...\", \"approach\": \"...\", \"concerns\": [\"...\"], \
             \"actions\": [{{\"action\": \"validate_document\", \"target\": \"<path>\"}}]}}",
            case = case,
            listing = sources.join("\n"),
            extensions = self.settings.allowed_extensions.join(", "),
            limit = self.settings.max_document_bytes,
        );
        match self.oracle.complete(&prompt) {
            Ok(reply) => match decode_reply(&reply) {
                OracleReply::Object(verdict) => Some(verdict),
                OracleReply::Raw(_) => {
                    log::debug!("[{}] undecodable intake assessment", case);
                    None
                }
            },
            Err(err) => {
                log::warn!("[{}] intake assessment unavailable: {}", case, err);
                None
            }
        }
    }

    fn fallback_reasoning(&self, count: usize) -> Reasoning {
        let mut reasoning = Reasoning::summarized(format!(
            "Validate {} offered documents against the intake rules",
            count
        ));
        reasoning.approach = Some(
            "Check existence, extension and size, then register each acceptable file".to_string(),
        );
        reasoning
    }

    /// First intake rule the file breaks, if any.
    fn validation_failure(&self, path: &Path) -> Option<String> {
        if !path.is_file() {
            return Some(format!("file not found: {}", path.display()));
        }
        if !self.settings.extension_allowed(path) {
            return Some(format!(
                "extension not allowed (accepted: {})",
                self.settings.allowed_extensions.join(", ")
            ));
        }
        match path.metadata() {
            Ok(meta) if meta.len() > self.settings.max_document_bytes => Some(format!(
                "file too large: {} bytes (limit {})",
                meta.len(),
                self.settings.max_document_bytes
            )),
            Ok(_) => None,
            Err(err) => Some(format!("file not readable: {}", err)),
        }
    }

    fn report_status(&self, blackboard: &mut Blackboard) -> anyhow::Result<Execution> {
        let stage = self.stage(blackboard)?;
        let mut stages = serde_json::Map::new();
        for (name, count) in stage.stage_summary()? {
            stages.insert(name.to_string(), json!(count));
        }
        let workflow = blackboard.workflow_summary();
        Ok(Execution::completed("Case status reported").with_outputs(json!({
            "stages": stages,
            "workflow": serde_json::to_value(workflow)?,
        })))
    }

    fn validate_documents(
        &self,
        observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<Execution> {
        let sources = self.offered_sources(observation, blackboard);
        if sources.is_empty() {
            return Ok(Execution::failed(
                "Nothing to validate",
                "no documents provided",
            ));
        }

        let stage = self.stage(blackboard)?;
        let case = blackboard.case_reference().to_string();
        let mut ordinal = stage.index()?.documents.len();
        let mut validated = Vec::new();
        let mut failed = Vec::new();

        for source in &sources {
            let path = Path::new(source);
            if let Some(reason) = self.validation_failure(path) {
                log::warn!("[{}] rejected {}: {}", case, source, reason);
                failed.push(json!({ "path": source, "reason": reason }));
                continue;
            }

            ordinal += 1;
            let document_id = ids::document_id(&case, ordinal);
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e.to_lowercase()))
                .unwrap_or_default();
            let filename = format!("{}{}", document_id, extension);

            match stage.add_document(&document_id, &filename, path, None) {
                Ok(_) => validated.push(json!({
                    "document_id": document_id,
                    "filename": filename,
                    "source": source,
                })),
                Err(err) => {
                    ordinal -= 1;
                    log::error!("[{}] could not store {}: {}", case, source, err);
                    failed.push(json!({ "path": source, "reason": err.to_string() }));
                }
            }
        }

        blackboard.update("validated_documents", json!(validated), self.name());
        if !failed.is_empty() {
            blackboard.update("failed_documents", json!(failed), self.name());
        }

        let status = if failed.is_empty() {
            ExecutionStatus::Completed
        } else if validated.is_empty() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Partial
        };
        let errors: Vec<String> = failed
            .iter()
            .filter_map(|f| f["reason"].as_str().map(str::to_string))
            .collect();
        Ok(Execution::completed(format!(
            "Validated {} of {} documents",
            validated.len(),
            sources.len()
        ))
        .with_status(status)
        .with_outputs(json!({ "validated": validated, "failed": failed }))
        .with_errors(errors))
    }
}

impl Worker for IntakeWorker {
    fn name(&self) -> &str {
        "intake"
    }

    fn role(&self) -> &str {
        "Validates incoming files and registers them into the intake stage"
    }

    fn reason(
        &self,
        observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<Reasoning> {
        if observation.task.action == "check_status" {
            return Ok(Reasoning::summarized("Report the current case status"));
        }
        let sources = self.offered_sources(observation, blackboard);
        if sources.is_empty() {
            let mut reasoning = Reasoning::summarized("No documents were offered");
            reasoning.concerns.push("no documents were offered".to_string());
            return Ok(reasoning);
        }
        let reasoning = match self.assessment(blackboard.case_reference(), &sources) {
            Some(verdict) => {
                let summary = verdict
                    .get("summary")
                    .and_then(Value::as_str)
                    .unwrap_or("Validate the offered documents")
                    .to_string();
                let mut reasoning = Reasoning::summarized(summary);
                reasoning.approach =
                    verdict.get("approach").and_then(Value::as_str).map(str::to_string);
                reasoning.concerns = verdict
                    .get("concerns")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items.iter().filter_map(Value::as_str).map(str::to_string).collect()
                    })
                    .unwrap_or_default();
                reasoning.detail = verdict;
                reasoning
            }
            None => self.fallback_reasoning(sources.len()),
        };
        Ok(reasoning)
    }

    fn plan(
        &self,
        reasoning: &Reasoning,
        observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<ActionPlan> {
        if observation.task.action == "check_status" {
            return Ok(ActionPlan::toward("Report case status")
                .with_action(PlannedAction::new("report_status")));
        }
        let mut plan = ActionPlan::toward("Register offered documents into intake");
        // Assessment-suggested actions take precedence when any were offered.
        if let Some(actions) = reasoning.detail.get("actions").and_then(Value::as_array) {
            for action in actions {
                if let Some(name) = action.get("action").and_then(Value::as_str) {
                    let mut planned = PlannedAction::new(name);
                    if let Some(target) = action.get("target").and_then(Value::as_str) {
                        planned = planned.on(target);
                    }
                    plan = plan.with_action(planned);
                }
            }
        }
        if plan.actions.is_empty() {
            for source in self.offered_sources(observation, blackboard) {
                plan = plan.with_action(PlannedAction::new("validate_document").on(source));
            }
        }
        Ok(plan)
    }

    fn act(
        &self,
        _plan: &ActionPlan,
        observation: &Observation,
        blackboard: &mut Blackboard,
    ) -> anyhow::Result<Execution> {
        match observation.task.action.as_str() {
            "check_status" => self.report_status(blackboard),
            _ => self.validate_documents(observation, blackboard),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Lifecycle, TaskSpec};
    use crate::oracle::ScriptedOracle;
    use crate::stage::Stage;
    use std::fs;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> String {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn run(
        settings: &Settings,
        task: TaskSpec,
        blackboard: &mut Blackboard,
    ) -> crate::lifecycle::WorkerReport {
        // No scripted replies: assessment and reflection both fall back.
        let oracle = Arc::new(ScriptedOracle::default());
        let lifecycle = Lifecycle::new(oracle.clone());
        lifecycle.execute(&IntakeWorker::new(settings.clone(), oracle), task, blackboard)
    }

    #[test]
    fn test_validates_and_registers_offered_files() {
        let root = tempdir().unwrap();
        let settings = Settings::new(root.path().join("docs"));
        let a = write_file(root.path(), "claim.pdf", b"%PDF a");
        let b = write_file(root.path(), "proof.pdf", b"%PDF b");
        let mut blackboard = Blackboard::in_memory("KYC_1");

        let task = TaskSpec::new("validate_documents")
            .with_parameters(json!({ "documents": [a, b] }));
        let report = run(&settings, task, &mut blackboard);

        assert_eq!(report.status, ExecutionStatus::Completed);
        let validated = blackboard.get("validated_documents").unwrap();
        assert_eq!(validated.as_array().unwrap().len(), 2);
        assert_eq!(validated[0]["document_id"], "KYC_1_DOC_001");
        assert_eq!(validated[1]["document_id"], "KYC_1_DOC_002");

        let stage = StageManager::new(&settings, "KYC_1").unwrap();
        assert_eq!(stage.documents_in_stage(Stage::Intake).unwrap().len(), 2);
    }

    #[test]
    fn test_mixed_batch_is_partial() {
        let root = tempdir().unwrap();
        let settings = Settings::new(root.path().join("docs"));
        let good = write_file(root.path(), "claim.pdf", b"%PDF a");
        let bad = write_file(root.path(), "virus.exe", b"MZ");
        let mut blackboard = Blackboard::in_memory("KYC_2");

        let task = TaskSpec::new("validate_documents")
            .with_parameters(json!({ "documents": [good, bad, "/missing.pdf"] }));
        let report = run(&settings, task, &mut blackboard);

        assert_eq!(report.status, ExecutionStatus::Partial);
        let failed = blackboard.get("failed_documents").unwrap();
        assert_eq!(failed.as_array().unwrap().len(), 2);
        assert!(failed[0]["reason"].as_str().unwrap().contains("extension"));
        assert!(failed[1]["reason"].as_str().unwrap().contains("not found"));
    }

    #[test]
    fn test_no_offered_documents_fails() {
        let root = tempdir().unwrap();
        let settings = Settings::new(root.path().join("docs"));
        let mut blackboard = Blackboard::in_memory("KYC_3");

        let report = run(&settings, TaskSpec::new("validate_documents"), &mut blackboard);

        assert_eq!(report.status, ExecutionStatus::Failed);
        let execution = report.execution.unwrap();
        assert_eq!(execution.errors, vec!["no documents provided"]);
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let root = tempdir().unwrap();
        let settings =
            Settings::new(root.path().join("docs")).with_max_document_bytes(4);
        let big = write_file(root.path(), "big.pdf", b"too many bytes");
        let mut blackboard = Blackboard::in_memory("KYC_4");

        let task =
            TaskSpec::new("validate_documents").with_parameters(json!({ "documents": [big] }));
        let report = run(&settings, task, &mut blackboard);

        assert_eq!(report.status, ExecutionStatus::Failed);
    }

    #[test]
    fn test_assessment_shapes_reasoning_and_plan() {
        let root = tempdir().unwrap();
        let settings = Settings::new(root.path().join("docs"));
        let a = write_file(root.path(), "claim.pdf", b"%PDF a");
        let mut blackboard = Blackboard::in_memory("KYC_7");

        let assessment = json!({
            "summary": "One PDF offered, nothing unusual",
            "approach": "Validate and register in offered order",
            "concerns": ["source sits outside the case directory"],
            "actions": [{ "action": "validate_document", "target": a }],
        });
        let oracle = Arc::new(ScriptedOracle::new([assessment.to_string()]));
        let lifecycle = Lifecycle::new(oracle.clone());
        let task =
            TaskSpec::new("validate_documents").with_parameters(json!({ "documents": [a] }));
        let report = lifecycle.execute(
            &IntakeWorker::new(settings.clone(), oracle.clone()),
            task,
            &mut blackboard,
        );

        assert_eq!(report.status, ExecutionStatus::Completed);
        let reasoning = report.reasoning.unwrap();
        assert_eq!(reasoning.summary, "One PDF offered, nothing unusual");
        assert_eq!(reasoning.concerns, vec!["source sits outside the case directory"]);
        let plan = report.plan.unwrap();
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].target.as_deref(), Some(a.as_str()));
        assert_eq!(oracle.remaining(), 0);
    }

    #[test]
    fn test_sources_fall_back_to_shared_documents_entry() {
        let root = tempdir().unwrap();
        let settings = Settings::new(root.path().join("docs"));
        let a = write_file(root.path(), "claim.pdf", b"%PDF a");
        let mut blackboard = Blackboard::in_memory("KYC_5");
        blackboard.update("documents", json!([a]), "tester");

        let report = run(&settings, TaskSpec::new("validate_documents"), &mut blackboard);

        assert_eq!(report.status, ExecutionStatus::Completed);
    }

    #[test]
    fn test_check_status_reports_stage_counts() {
        let root = tempdir().unwrap();
        let settings = Settings::new(root.path().join("docs"));
        let mut blackboard = Blackboard::in_memory("KYC_6");

        let report = run(&settings, TaskSpec::new("check_status"), &mut blackboard);

        assert_eq!(report.status, ExecutionStatus::Completed);
        let outputs = &report.execution.unwrap().outputs;
        assert_eq!(outputs["stages"]["intake"], 0);
        assert_eq!(outputs["workflow"]["phase"], "initialization");
    }
}
