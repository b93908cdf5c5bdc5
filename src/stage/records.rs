//! The case index and its entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StageError;

/// Lifecycle stages a document can occupy, in forward pipeline order.
///
/// The order is advisory: reprocessing may move a document back to any
/// earlier stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Intake,
    Classification,
    Extraction,
    Processed,
}

impl Stage {
    /// Every stage, in pipeline order.
    pub const ALL: [Stage; 4] =
        [Stage::Intake, Stage::Classification, Stage::Extraction, Stage::Processed];

    /// Directory name under the case directory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Classification => "classification",
            Stage::Extraction => "extraction",
            Stage::Processed => "processed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Stage {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "intake" => Ok(Stage::Intake),
            "classification" => Ok(Stage::Classification),
            "extraction" => Ok(Stage::Extraction),
            "processed" => Ok(Stage::Processed),
            other => Err(StageError::UnknownStage { name: other.to_string() }),
        }
    }
}

/// One index entry: where a document is and where its sidecar lives.
///
/// Pointers only. Sizes, checksums and stage results belong to the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub document_id: String,
    pub stage: Stage,
    /// Sidecar path relative to the case directory, recomputed on every
    /// move.
    pub metadata_path: String,
    /// Lineage reference to the document this one was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_file: Option<String>,
    pub moved_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Stored filename, derived from the sidecar pointer.
    pub fn filename(&self) -> Option<&str> {
        let name = self.metadata_path.rsplit('/').next()?;
        name.strip_suffix(super::SIDECAR_SUFFIX)
    }
}

/// The per-case document index, serialized as `case_metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseIndex {
    pub case_reference: String,
    pub created_date: DateTime<Utc>,
    pub status: String,
    pub workflow_stage: String,
    #[serde(default)]
    pub documents: Vec<DocumentRecord>,
}

impl CaseIndex {
    pub fn new(case_reference: &str) -> Self {
        Self {
            case_reference: case_reference.to_string(),
            created_date: Utc::now(),
            status: "active".to_string(),
            workflow_stage: Stage::Intake.dir_name().to_string(),
            documents: Vec::new(),
        }
    }

    pub fn document(&self, document_id: &str) -> Option<&DocumentRecord> {
        self.documents.iter().find(|d| d.document_id == document_id)
    }

    pub fn document_mut(&mut self, document_id: &str) -> Option<&mut DocumentRecord> {
        self.documents.iter_mut().find(|d| d.document_id == document_id)
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.document(document_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_serializes_as_snake_case() {
        assert_eq!(serde_json::to_value(Stage::Intake).unwrap(), "intake");
        assert_eq!(serde_json::to_value(Stage::Processed).unwrap(), "processed");
    }

    #[test]
    fn test_stage_parses_ignoring_case_and_padding() {
        assert_eq!(" Classification ".parse::<Stage>().unwrap(), Stage::Classification);
        assert!(matches!(
            "shipping".parse::<Stage>(),
            Err(StageError::UnknownStage { name }) if name == "shipping"
        ));
    }

    #[test]
    fn test_record_filename_comes_from_the_sidecar_pointer() {
        let record = DocumentRecord {
            document_id: "C1_DOC_001".to_string(),
            stage: Stage::Intake,
            metadata_path: "intake/C1_DOC_001.pdf.metadata.json".to_string(),
            parent_file: None,
            moved_at: Utc::now(),
        };
        assert_eq!(record.filename(), Some("C1_DOC_001.pdf"));
    }

    #[test]
    fn test_index_lookup_by_id() {
        let mut index = CaseIndex::new("CASE_R_1");
        assert_eq!(index.status, "active");
        assert_eq!(index.workflow_stage, "intake");
        index.documents.push(DocumentRecord {
            document_id: "CASE_R_1_DOC_001".to_string(),
            stage: Stage::Intake,
            metadata_path: "intake/CASE_R_1_DOC_001.pdf.metadata.json".to_string(),
            parent_file: None,
            moved_at: Utc::now(),
        });
        assert!(index.contains("CASE_R_1_DOC_001"));
        assert!(index.document("CASE_R_1_DOC_999").is_none());
    }
}
