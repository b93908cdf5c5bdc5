//! Case references, document identifiers and content digests.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static CASE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]*$").unwrap());

/// Uppercase a user-entered case reference and replace whitespace runs with
/// underscores. Does not guarantee validity; check with
/// [`is_valid_case_reference`].
pub fn normalize_case_reference(raw: &str) -> String {
    raw.trim().to_uppercase().split_whitespace().collect::<Vec<_>>().join("_")
}

/// Whether `reference` is safe to use as a case directory name.
pub fn is_valid_case_reference(reference: &str) -> bool {
    CASE_REFERENCE.is_match(reference)
}

/// Case-scoped document id: `<CASE>_DOC_<NNN>`.
pub fn document_id(case_reference: &str, ordinal: usize) -> String {
    format!("{}_DOC_{:03}", case_reference, ordinal)
}

/// Streaming SHA-256 digest of a file, hex encoded.
pub fn sha256_hex(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_case_reference() {
        assert_eq!(normalize_case_reference("  kyc 2026 001 "), "KYC_2026_001");
        assert_eq!(normalize_case_reference("KYC-2026-001"), "KYC-2026-001");
    }

    #[test]
    fn test_case_reference_validity() {
        assert!(is_valid_case_reference("KYC_2026_001"));
        assert!(is_valid_case_reference("KYC-2026-001"));
        assert!(!is_valid_case_reference("kyc_001"));
        assert!(!is_valid_case_reference("../evil"));
        assert!(!is_valid_case_reference(""));
        assert!(!is_valid_case_reference("_LEADING"));
    }

    #[test]
    fn test_document_id_format() {
        assert_eq!(document_id("KYC_001", 7), "KYC_001_DOC_007");
        assert_eq!(document_id("KYC_001", 123), "KYC_001_DOC_123");
    }

    #[test]
    fn test_sha256_hex_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"hello").unwrap();
        drop(file);

        assert_eq!(
            sha256_hex(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
