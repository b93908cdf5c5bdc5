//! Per-document metadata sidecars.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Suffix appended to a stored filename to name its sidecar.
pub const SIDECAR_SUFFIX: &str = ".metadata.json";

/// Sidecar filename for a stored document filename.
pub fn sidecar_name(filename: &str) -> String {
    format!("{}{}", filename, SIDECAR_SUFFIX)
}

/// The metadata file stored beside every primary document file.
///
/// Identity and provenance fields are fixed at intake. Everything else is
/// free-form, keyed by the stage that produced it (`classification`,
/// `extraction`, ...) and accumulated through [`DocumentMetadata::merge`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub document_id: String,
    /// Stored filename, shared with the primary file across stages.
    pub filename: String,
    /// Where the file was copied from at intake.
    pub source_path: String,
    pub size_bytes: u64,
    pub checksum_sha256: String,
    pub added_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_file: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Stage results and any other free-form keys.
    #[serde(flatten)]
    pub stage_results: Map<String, Value>,
}

/// Keys merge refuses to overwrite. `last_updated` is maintained by merge
/// itself; the rest are fixed at intake.
const PROTECTED_KEYS: [&str; 7] = [
    "document_id",
    "filename",
    "source_path",
    "size_bytes",
    "checksum_sha256",
    "added_at",
    "last_updated",
];

impl DocumentMetadata {
    pub fn new(
        document_id: &str,
        filename: &str,
        source_path: &str,
        size_bytes: u64,
        checksum_sha256: &str,
        parent_file: Option<&str>,
    ) -> Self {
        let now = Utc::now();
        Self {
            document_id: document_id.to_string(),
            filename: filename.to_string(),
            source_path: source_path.to_string(),
            size_bytes,
            checksum_sha256: checksum_sha256.to_string(),
            added_at: now,
            last_updated: now,
            parent_file: parent_file.map(str::to_string),
            errors: Vec::new(),
            warnings: Vec::new(),
            stage_results: Map::new(),
        }
    }

    /// Fold free-form updates into the sidecar.
    ///
    /// `errors` and `warnings` values append to their lists; identity
    /// fields are never overwritten; everything else lands in
    /// `stage_results`, replacing any previous value under the same key.
    pub fn merge(&mut self, updates: &Map<String, Value>) {
        for (key, value) in updates {
            match key.as_str() {
                "errors" => self.errors.extend(string_items(value)),
                "warnings" => self.warnings.extend(string_items(value)),
                "parent_file" => {
                    if self.parent_file.is_none() {
                        self.parent_file = value.as_str().map(str::to_string);
                    } else {
                        log::warn!(
                            "ignoring parent_file overwrite on {}",
                            self.document_id
                        );
                    }
                }
                key if PROTECTED_KEYS.contains(&key) => {
                    log::warn!("ignoring protected key '{}' on {}", key, self.document_id);
                }
                _ => {
                    self.stage_results.insert(key.clone(), value.clone());
                }
            }
        }
        self.last_updated = Utc::now();
    }

    /// Results recorded by a stage, if any.
    pub fn stage_section(&self, stage: &str) -> Option<&Value> {
        self.stage_results.get(stage)
    }
}

/// A string value or an array of them, as a list.
fn string_items(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
