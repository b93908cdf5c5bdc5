//! The stage manager.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Map;

use crate::settings::Settings;
use crate::utilities::ids::{is_valid_case_reference, sha256_hex};
use crate::utilities::json_file;

use super::records::{CaseIndex, DocumentRecord, Stage};
use super::sidecar::{sidecar_name, DocumentMetadata};
use super::StageError;

/// Case index filename, at the root of the case directory.
pub const INDEX_FILE: &str = "case_metadata.json";

/// Keeps one case's documents each in exactly one stage directory, with
/// the metadata sidecar beside the primary file.
///
/// Every operation reloads the index from disk and writes it back after a
/// mutation, so the manager holds no document state of its own.
#[derive(Debug, Clone)]
pub struct StageManager {
    case_reference: String,
    case_dir: PathBuf,
}

impl StageManager {
    /// Open (or create) the stage tree for `case_reference`.
    pub fn new(settings: &Settings, case_reference: &str) -> Result<Self, StageError> {
        if !is_valid_case_reference(case_reference) {
            return Err(StageError::InvalidCaseReference {
                reference: case_reference.to_string(),
            });
        }
        let case_dir = settings.case_dir(case_reference);
        for stage in Stage::ALL {
            fs::create_dir_all(case_dir.join(stage.dir_name()))?;
        }
        let manager = Self { case_reference: case_reference.to_string(), case_dir };
        if !manager.index_path().exists() {
            manager.save_index(&CaseIndex::new(case_reference))?;
            log::info!("[{}] created case directory at {}", case_reference, manager.case_dir.display());
        }
        Ok(manager)
    }

    pub fn case_reference(&self) -> &str {
        &self.case_reference
    }

    pub fn case_dir(&self) -> &Path {
        &self.case_dir
    }

    fn index_path(&self) -> PathBuf {
        self.case_dir.join(INDEX_FILE)
    }

    fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.case_dir.join(stage.dir_name())
    }

    fn load_index(&self) -> Result<CaseIndex, StageError> {
        Ok(json_file::read_json::<CaseIndex>(&self.index_path())?
            .unwrap_or_else(|| CaseIndex::new(&self.case_reference)))
    }

    fn save_index(&self, index: &CaseIndex) -> Result<(), StageError> {
        json_file::write_json(&self.index_path(), index)?;
        Ok(())
    }

    /// Copy a new document into the intake stage.
    ///
    /// The source is copied, never moved or deleted. A sidecar with
    /// identity, size, checksum and provenance is written beside the copy,
    /// and a pointer entry joins the index.
    pub fn add_document(
        &self,
        document_id: &str,
        filename: &str,
        source_path: &Path,
        parent_file: Option<&str>,
    ) -> Result<DocumentRecord, StageError> {
        let mut index = self.load_index()?;
        if index.contains(document_id) {
            return Err(StageError::DuplicateDocument { document_id: document_id.to_string() });
        }
        if !source_path.is_file() {
            return Err(StageError::SourceMissing { path: source_path.to_path_buf() });
        }

        let stored = self.stage_dir(Stage::Intake).join(filename);
        fs::copy(source_path, &stored)?;
        let size_bytes = fs::metadata(&stored)?.len();
        let checksum = sha256_hex(&stored)?;

        let metadata = DocumentMetadata::new(
            document_id,
            filename,
            &source_path.to_string_lossy(),
            size_bytes,
            &checksum,
            parent_file,
        );
        let metadata_path = format!("{}/{}", Stage::Intake.dir_name(), sidecar_name(filename));
        json_file::write_json(&self.case_dir.join(&metadata_path), &metadata)?;

        let record = DocumentRecord {
            document_id: document_id.to_string(),
            stage: Stage::Intake,
            metadata_path,
            parent_file: parent_file.map(str::to_string),
            moved_at: metadata.added_at,
        };
        index.documents.push(record.clone());
        self.save_index(&index)?;
        log::info!(
            "[{}] added {} as {} ({} bytes)",
            self.case_reference,
            source_path.display(),
            document_id,
            size_bytes
        );
        Ok(record)
    }

    /// Relocate a document's primary file and sidecar to `target`.
    ///
    /// A no-op success when the document is already there. The primary
    /// file must exist at its current stage path; if it does not, nothing
    /// moves and the index entry is left unchanged.
    pub fn move_to_stage(
        &self,
        document_id: &str,
        target: Stage,
    ) -> Result<DocumentRecord, StageError> {
        let mut index = self.load_index()?;
        let record = index
            .document(document_id)
            .cloned()
            .ok_or_else(|| StageError::UnknownDocument { document_id: document_id.to_string() })?;
        if record.stage == target {
            return Ok(record);
        }

        let sidecar_path = self.case_dir.join(&record.metadata_path);
        let metadata = json_file::read_json::<DocumentMetadata>(&sidecar_path)?.ok_or_else(|| {
            StageError::SidecarMissing {
                document_id: document_id.to_string(),
                path: sidecar_path.clone(),
            }
        })?;

        let filename = metadata.filename.as_str();
        let current_primary = self.stage_dir(record.stage).join(filename);
        if !current_primary.is_file() {
            return Err(StageError::PrimaryFileMissing {
                document_id: document_id.to_string(),
                expected: current_primary,
            });
        }

        let target_primary = self.stage_dir(target).join(filename);
        let target_sidecar = self.stage_dir(target).join(sidecar_name(filename));
        fs::rename(&current_primary, &target_primary)?;
        if let Err(err) = fs::rename(&sidecar_path, &target_sidecar) {
            // The pair moves together or not at all.
            let _ = fs::rename(&target_primary, &current_primary);
            return Err(err.into());
        }

        let moved_at = chrono::Utc::now();
        let new_metadata_path = format!("{}/{}", target.dir_name(), sidecar_name(filename));
        {
            let entry = index.document_mut(document_id).ok_or_else(|| {
                StageError::UnknownDocument { document_id: document_id.to_string() }
            })?;
            entry.stage = target;
            entry.metadata_path = new_metadata_path;
            entry.moved_at = moved_at;
        }
        self.save_index(&index)?;
        log::info!(
            "[{}] moved {} from {} to {}",
            self.case_reference,
            document_id,
            record.stage,
            target
        );
        index
            .document(document_id)
            .cloned()
            .ok_or_else(|| StageError::UnknownDocument { document_id: document_id.to_string() })
    }

    /// All index entries currently in `stage`, in intake order.
    pub fn documents_in_stage(&self, stage: Stage) -> Result<Vec<DocumentRecord>, StageError> {
        let index = self.load_index()?;
        Ok(index.documents.into_iter().filter(|d| d.stage == stage).collect())
    }

    /// The index entry for a document.
    pub fn document(&self, document_id: &str) -> Result<DocumentRecord, StageError> {
        self.load_index()?
            .document(document_id)
            .cloned()
            .ok_or_else(|| StageError::UnknownDocument { document_id: document_id.to_string() })
    }

    /// The sidecar for a document.
    pub fn document_metadata(&self, document_id: &str) -> Result<DocumentMetadata, StageError> {
        let record = self.document(document_id)?;
        let path = self.case_dir.join(&record.metadata_path);
        json_file::read_json::<DocumentMetadata>(&path)?.ok_or_else(|| {
            StageError::SidecarMissing { document_id: document_id.to_string(), path }
        })
    }

    /// Merge free-form updates into a document's sidecar and rewrite it.
    pub fn update_document_metadata(
        &self,
        document_id: &str,
        updates: &Map<String, serde_json::Value>,
    ) -> Result<DocumentMetadata, StageError> {
        let record = self.document(document_id)?;
        let path = self.case_dir.join(&record.metadata_path);
        let mut metadata = json_file::read_json::<DocumentMetadata>(&path)?.ok_or_else(|| {
            StageError::SidecarMissing { document_id: document_id.to_string(), path: path.clone() }
        })?;
        metadata.merge(updates);
        json_file::write_json(&path, &metadata)?;
        Ok(metadata)
    }

    /// Record one stage's results section on a document's sidecar.
    pub fn record_stage_section(
        &self,
        document_id: &str,
        section: &str,
        value: serde_json::Value,
    ) -> Result<DocumentMetadata, StageError> {
        let mut updates = Map::new();
        updates.insert(section.to_string(), value);
        self.update_document_metadata(document_id, &updates)
    }

    /// Document counts per stage. Stages with no documents are included.
    pub fn stage_summary(&self) -> Result<BTreeMap<Stage, usize>, StageError> {
        let index = self.load_index()?;
        let mut counts: BTreeMap<Stage, usize> = Stage::ALL.iter().map(|s| (*s, 0)).collect();
        for record in &index.documents {
            *counts.entry(record.stage).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// The whole case index.
    pub fn index(&self) -> Result<CaseIndex, StageError> {
        self.load_index()
    }

    /// Update the case-level workflow stage label in the index.
    pub fn set_workflow_stage(&self, stage: Stage) -> Result<(), StageError> {
        let mut index = self.load_index()?;
        index.workflow_stage = stage.dir_name().to_string();
        self.save_index(&index)
    }
}
