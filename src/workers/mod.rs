//! The worker team.
//!
//! Four specialized workers cover the document pipeline: intake validates
//! and registers files, classification assigns categories, extraction
//! pulls structured fields, completion verifies and closes the case out.
//! Each implements the phased capability contract and touches case state
//! only through the blackboard and the stage tracker, so they compose under
//! any plan the supervisor adopts.

mod classification;
mod completion;
mod extraction;
mod intake;

pub use classification::ClassificationWorker;
pub use completion::CompletionWorker;
pub use extraction::ExtractionWorker;
pub use intake::IntakeWorker;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::Blackboard;
    use crate::lifecycle::ExecutionStatus;
    use crate::oracle::ScriptedOracle;
    use crate::settings::Settings;
    use crate::stage::{Stage, StageManager};
    use crate::supervisor::{PlanSource, Supervisor};
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    const REFLECTION: &str = r#"{"success": true, "quality_score": 0.9,
        "issues": [], "suggestions": [], "notify_agents": {}}"#;

    fn team(settings: &Settings, oracle: Arc<ScriptedOracle>) -> Supervisor {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut supervisor = Supervisor::new(oracle.clone());
        supervisor.register(IntakeWorker::new(settings.clone(), oracle.clone()));
        supervisor.register(ClassificationWorker::new(settings.clone(), oracle.clone()));
        supervisor.register(ExtractionWorker::new(settings.clone(), oracle.clone()));
        supervisor.register(CompletionWorker::new(settings.clone(), oracle));
        supervisor
    }

    #[test]
    fn test_full_pipeline_under_a_planned_workflow() {
        let root = tempdir().unwrap();
        let settings = Settings::new(root.path().join("docs"));
        let source = root.path().join("passport.pdf");
        fs::write(&source, b"%PDF passport scan").unwrap();

        let plan_reply = format!(
            r#"[
    {{"step_id": "intake", "agent": "intake", "action": "validate_documents",
      "parameters": {{"documents": ["{src}"]}}, "error_handling": "fail_workflow"}},
    {{"step_id": "classification", "agent": "classification",
      "action": "classify_documents", "dependencies": ["intake"]}},
    {{"step_id": "extraction", "agent": "extraction", "action": "extract_data",
      "dependencies": ["classification"]}},
    {{"step_id": "completion", "agent": "completion", "action": "finalize_case",
      "dependencies": ["extraction"]}}
]"#,
            src = source.display()
        );
        // Sequential execution makes the oracle call order deterministic:
        // plan, then per step any assessments and verdicts followed by one
        // reflection.
        let oracle = Arc::new(ScriptedOracle::new([
            plan_reply,
            r#"{"summary": "One passport scan to validate", "concerns": []}"#.to_string(),
            REFLECTION.to_string(),
            r#"{"category": "Identity Proof", "confidence": 0.95}"#.to_string(),
            REFLECTION.to_string(),
            r#"{"fields": {"name": "A. Example", "number": "X123"}}"#.to_string(),
            REFLECTION.to_string(),
            r#"{"summary": "Case closed with one identity document.", "document_count": 1}"#
                .to_string(),
            REFLECTION.to_string(),
        ]));

        let supervisor = team(&settings, oracle.clone());
        let mut blackboard = Blackboard::open(&settings, "KYC_2024_001");
        let report = supervisor.process_request("Process the submitted documents", &mut blackboard);

        assert_eq!(report.status(), ExecutionStatus::Completed);
        assert_eq!(
            report.outcome.completed,
            vec!["intake", "classification", "extraction", "completion"]
        );
        assert_eq!(oracle.remaining(), 0);

        let stage = StageManager::new(&settings, "KYC_2024_001").unwrap();
        assert_eq!(stage.documents_in_stage(Stage::Processed).unwrap().len(), 1);
        let metadata = stage.document_metadata("KYC_2024_001_DOC_001").unwrap();
        assert_eq!(
            metadata.stage_section("classification").unwrap()["category"],
            "Identity Proof"
        );
        assert_eq!(
            metadata.stage_section("extraction").unwrap()["fields"]["name"],
            "A. Example"
        );
        assert_eq!(metadata.stage_section("completion").unwrap()["verified"], true);

        assert!(blackboard.get("validated_documents").is_some());
        assert!(blackboard.get("classification_results").is_some());
        assert!(blackboard.get("extraction_results").is_some());
        assert_eq!(
            blackboard.get("case_summary").unwrap()["summary"],
            "Case closed with one identity document."
        );
        assert_eq!(
            blackboard.workflow().completed_steps,
            vec!["intake", "classification", "extraction", "completion"]
        );
        assert_eq!(blackboard.messages_for("intake", false).len(), 1);
    }

    #[test]
    fn test_default_workflow_extracts_before_classification() {
        let root = tempdir().unwrap();
        let settings = Settings::new(root.path().join("docs"));
        let source = root.path().join("bill.pdf");
        fs::write(&source, b"%PDF utility bill").unwrap();

        // The planner has nothing structured to offer, so the fixed
        // workflow runs: intake, then extraction, then classification.
        // Intake's assessment reply is unusable too and falls back.
        let oracle = Arc::new(ScriptedOracle::new([
            "Let me think about this case first.".to_string(),
            "Checking the offered bill first.".to_string(),
            REFLECTION.to_string(),
            r#"{"fields": {"amount": "80.00"}}"#.to_string(),
            REFLECTION.to_string(),
            REFLECTION.to_string(),
        ]));

        let supervisor = team(&settings, oracle.clone());
        let mut blackboard = Blackboard::in_memory("KYC_2024_002");
        blackboard.update(
            "documents",
            serde_json::json!([source.to_string_lossy()]),
            "api",
        );

        let report = supervisor.process_request("process the case", &mut blackboard);

        assert_eq!(report.plan.source, PlanSource::DefaultWorkflow);
        assert_eq!(report.status(), ExecutionStatus::Completed);
        assert_eq!(
            report.outcome.completed,
            vec!["intake", "extraction", "classification"]
        );
        assert_eq!(oracle.remaining(), 0);

        // Extraction ran first and took the intake documents with it, so
        // classification had nothing left and completed as a no-op.
        let stage = StageManager::new(&settings, "KYC_2024_002").unwrap();
        assert_eq!(stage.documents_in_stage(Stage::Extraction).unwrap().len(), 1);
        assert!(stage.documents_in_stage(Stage::Classification).unwrap().is_empty());
        assert!(blackboard.get("classification_results").is_none());
    }

    #[test]
    fn test_failed_intake_halts_the_default_workflow() {
        let root = tempdir().unwrap();
        let settings = Settings::new(root.path().join("docs"));

        let oracle = Arc::new(ScriptedOracle::new([
            "no structured plan".to_string(),
            r#"{"summary": "One file offered", "concerns": ["the file may not exist"]}"#
                .to_string(),
            REFLECTION.to_string(),
        ]));
        let supervisor = team(&settings, oracle);
        let mut blackboard = Blackboard::in_memory("KYC_2024_003");
        blackboard.update("documents", serde_json::json!(["/missing/a.pdf"]), "api");

        let report = supervisor.process_request("process the case", &mut blackboard);

        // Intake fails outright, and its fail_workflow policy stops the
        // pass before extraction or classification run.
        assert_eq!(report.status(), ExecutionStatus::Partial);
        assert!(report.outcome.halted);
        assert_eq!(report.outcome.failed[0].step_id, "intake");
        assert!(report.outcome.reports.get("extraction").is_none());
        assert_eq!(blackboard.workflow().failed_steps, vec!["intake"]);
    }
}
