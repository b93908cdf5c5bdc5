//! Runtime configuration.
//!
//! A [`Settings`] value is constructed at the application boundary and handed
//! to every component that touches the filesystem. There is no global
//! configuration object and nothing is read from the environment here.

use std::path::{Path, PathBuf};

/// Filesystem layout and intake limits for a processing run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Root directory under which per-case directories live.
    pub documents_dir: PathBuf,
    /// Lowercase file extensions accepted at intake, with leading dot.
    pub allowed_extensions: Vec<String>,
    /// Upper bound on a single document's size in bytes.
    pub max_document_bytes: u64,
}

impl Settings {
    /// Settings rooted at `documents_dir` with the default intake limits
    /// (PDF only, 10 MB).
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
            allowed_extensions: vec![".pdf".to_string()],
            max_document_bytes: 10 * 1024 * 1024,
        }
    }

    /// Accept `extensions` at intake instead of the default set.
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Cap document size at `bytes` instead of the default.
    pub fn with_max_document_bytes(mut self, bytes: u64) -> Self {
        self.max_document_bytes = bytes;
        self
    }

    /// Directory holding all artifacts for one case.
    pub fn case_dir(&self, case_reference: &str) -> PathBuf {
        self.documents_dir.join("cases").join(case_reference)
    }

    /// Whether the extension of `path` is accepted at intake.
    pub fn extension_allowed(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let dotted = format!(".{}", ext.to_lowercase());
                self.allowed_extensions.iter().any(|allowed| allowed.to_lowercase() == dotted)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_dir_layout() {
        let settings = Settings::new("/tmp/docs");
        assert_eq!(settings.case_dir("KYC_001"), PathBuf::from("/tmp/docs/cases/KYC_001"));
    }

    #[test]
    fn test_extension_allowed_is_case_insensitive() {
        let settings = Settings::new("/tmp/docs");
        assert!(settings.extension_allowed(Path::new("scan.PDF")));
        assert!(!settings.extension_allowed(Path::new("scan.exe")));
        assert!(!settings.extension_allowed(Path::new("no_extension")));
    }

    #[test]
    fn test_custom_limits() {
        let settings = Settings::new("/tmp/docs")
            .with_allowed_extensions([".pdf", ".png"])
            .with_max_document_bytes(1024);
        assert!(settings.extension_allowed(Path::new("photo.png")));
        assert_eq!(settings.max_document_bytes, 1024);
    }
}
