//! Per-case document lifecycle tracking.
//!
//! Each case owns a directory tree with one subdirectory per stage. A
//! document is a primary file plus a metadata sidecar living beside it, and
//! the two move between stage directories together or not at all. The case
//! index (`case_metadata.json`) maps every document id to exactly one stage
//! and points at its sidecar; it carries no processing payloads.
//!
//! [`StageManager`] is stateless between operations: every call reloads the
//! index from disk, so multiple managers for the same case directory stay
//! consistent as long as their operations do not interleave.

mod manager;
mod records;
mod sidecar;

pub use manager::{StageManager, INDEX_FILE};
pub use records::{CaseIndex, DocumentRecord, Stage};
pub use sidecar::{sidecar_name, DocumentMetadata, SIDECAR_SUFFIX};

use std::path::PathBuf;

use thiserror::Error;

use crate::utilities::json_file::JsonFileError;

/// Errors from document staging operations.
#[derive(Debug, Error)]
pub enum StageError {
    /// A stage name did not match any known stage.
    #[error("Unknown stage: {name}")]
    UnknownStage { name: String },

    /// The case reference failed validation.
    #[error("Invalid case reference: {reference}")]
    InvalidCaseReference { reference: String },

    /// The document id is not in the case index.
    #[error("Unknown document: {document_id}")]
    UnknownDocument { document_id: String },

    /// The document id is already in the case index.
    #[error("Duplicate document: {document_id}")]
    DuplicateDocument { document_id: String },

    /// The file offered for intake does not exist.
    #[error("Source file not found: {}", .path.display())]
    SourceMissing { path: PathBuf },

    /// The primary file was not where the index says it should be. The
    /// index entry is left unchanged.
    #[error("Primary file for {document_id} missing at {}", .expected.display())]
    PrimaryFileMissing { document_id: String, expected: PathBuf },

    /// The metadata sidecar was not where the index points.
    #[error("Metadata sidecar for {document_id} missing at {}", .path.display())]
    SidecarMissing { document_id: String, path: PathBuf },

    /// Index or sidecar file could not be read or written.
    #[error(transparent)]
    File(#[from] JsonFileError),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
