//! OCR name verification.
//!
//! Recognized item names are never trusted raw: they are normalized,
//! run through a correction table of known recurring OCR confusions,
//! and finally compared with a containment fallback. Every non-exact
//! comparison lands in a mismatch log so the correction table can be
//! grown from real failures.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

/// Errors raised while loading or persisting verification data.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse corrections {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for verification operations.
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Canonicalize a name for comparison.
///
/// Decomposes to NFD and drops combining marks, removes punctuation
/// and all whitespace, lowercases. "Zho's Mask" and "zhos mask" both
/// normalize to "zhosmask".
pub fn normalize(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Known recurring OCR confusions, applied as substring replacements
/// over normalized text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionTable {
    corrections: BTreeMap<String, String>,
}

impl CorrectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table from a JSON object of recognized -> canonical
    /// substrings. A missing file yields an empty table.
    pub fn load(path: impl AsRef<Path>) -> VerifyResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| VerifyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let corrections: BTreeMap<String, String> =
            serde_json::from_str(&raw).map_err(|source| VerifyError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        // entries compare against normalized text, so store them normalized
        let corrections = corrections
            .into_iter()
            .map(|(k, v)| (normalize(&k), normalize(&v)))
            .collect();
        Ok(Self { corrections })
    }

    /// Add a correction pair (stored normalized).
    pub fn insert(&mut self, recognized: &str, canonical: &str) {
        self.corrections
            .insert(normalize(recognized), normalize(canonical));
    }

    pub fn len(&self) -> usize {
        self.corrections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }

    /// Apply every correction to an already-normalized string.
    pub fn apply(&self, normalized: &str) -> String {
        let mut out = normalized.to_string();
        for (wrong, right) in &self.corrections {
            if !wrong.is_empty() && out.contains(wrong.as_str()) {
                out = out.replace(wrong.as_str(), right);
            }
        }
        out
    }
}

/// Append-only record of "canonical | recognized" pairs that did not
/// compare exactly equal, deduplicated and kept sorted on save.
#[derive(Debug, Default)]
pub struct MismatchLog {
    entries: BTreeSet<String>,
    dirty: bool,
}

impl MismatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load previously logged mismatches so re-runs do not duplicate.
    pub fn load(path: impl AsRef<Path>) -> VerifyResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| VerifyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entries = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        Ok(Self {
            entries,
            dirty: false,
        })
    }

    /// Record a mismatch pair.
    pub fn record(&mut self, canonical: &str, recognized: &str) {
        let line = format!("{} | {}", canonical, recognized);
        if self.entries.insert(line) {
            self.dirty = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the log out, sorted and deduplicated. No-op when nothing
    /// new was recorded.
    pub fn save(&mut self, path: impl AsRef<Path>) -> VerifyResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| VerifyError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let mut body: String = self
            .entries
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        body.push('\n');
        std::fs::write(path, body).map_err(|source| VerifyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.dirty = false;
        Ok(())
    }
}

/// How a recognized name compared against the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    /// Normalized forms were identical
    Exact,
    /// Equal only after applying the correction table
    Corrected,
    /// One normalized form contained the other
    Containment,
    /// No relationship found
    Mismatch,
}

impl NameMatch {
    /// Whether this outcome is good enough to act on.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, NameMatch::Mismatch)
    }
}

/// Compares recognized names against expected ones and keeps the
/// mismatch log fed.
#[derive(Debug, Default)]
pub struct NameVerifier {
    corrections: CorrectionTable,
    mismatches: MismatchLog,
}

impl NameVerifier {
    pub fn new(corrections: CorrectionTable, mismatches: MismatchLog) -> Self {
        Self {
            corrections,
            mismatches,
        }
    }

    /// Compare a recognized name against the canonical one.
    ///
    /// Acceptance order: exact normalized equality, equality after
    /// corrections, then containment either way. Any outcome other
    /// than exact equality is recorded for later curation.
    pub fn verify(&mut self, canonical: &str, recognized: &str) -> NameMatch {
        let want = normalize(canonical);
        let got = normalize(recognized);

        if want == got {
            return NameMatch::Exact;
        }

        // non-exact pairs feed the correction table workflow
        self.mismatches.record(canonical, recognized);

        let corrected = self.corrections.apply(&got);
        if want == corrected {
            debug!(canonical, recognized, "name accepted via correction table");
            return NameMatch::Corrected;
        }

        if !want.is_empty()
            && !corrected.is_empty()
            && (want.contains(corrected.as_str()) || corrected.contains(want.as_str()))
        {
            debug!(canonical, recognized, "name accepted via containment");
            return NameMatch::Containment;
        }

        warn!(canonical, recognized, "recognized name did not verify");
        NameMatch::Mismatch
    }

    pub fn mismatches(&self) -> &MismatchLog {
        &self.mismatches
    }

    /// Persist the mismatch log.
    pub fn save_mismatches(&mut self, path: impl AsRef<Path>) -> VerifyResult<()> {
        self.mismatches.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_diacritics_punctuation_whitespace_case() {
        assert_eq!(normalize("Zho's Mask"), "zhosmask");
        assert_eq!(normalize("Béigarath"), "beigarath");
        assert_eq!(normalize("Sigil of Force (Superior)"), "sigilofforcesuperior");
        assert_eq!(normalize("  "), "");
    }

    #[test]
    fn exact_after_normalization() {
        let mut verifier = NameVerifier::default();
        assert_eq!(
            verifier.verify("Zho's Mask", "zhos mask"),
            NameMatch::Exact
        );
        assert!(verifier.mismatches().is_empty());
    }

    #[test]
    fn correction_table_repairs_known_confusion() {
        let mut corrections = CorrectionTable::new();
        // tesseract reads "Il" as "ll" in this font
        corrections.insert("llusion", "Ilusion");

        let mut verifier = NameVerifier::new(corrections, MismatchLog::new());
        let outcome = verifier.verify("Ilusion Dust", "llusion Dust");
        assert_eq!(outcome, NameMatch::Corrected);
        assert!(outcome.is_accepted());
        // still logged for curation
        assert_eq!(verifier.mismatches().len(), 1);
    }

    #[test]
    fn containment_accepts_truncated_recognition() {
        let mut verifier = NameVerifier::default();
        let outcome = verifier.verify("Superior Sigil of Bloodlust", "Superior Sigil of Blood");
        assert_eq!(outcome, NameMatch::Containment);
        assert!(outcome.is_accepted());
    }

    #[test]
    fn unrelated_names_reject_and_log() {
        let mut verifier = NameVerifier::default();
        let outcome = verifier.verify("Copper Ore", "Mithril Ingot");
        assert_eq!(outcome, NameMatch::Mismatch);
        assert!(!outcome.is_accepted());
        assert_eq!(verifier.mismatches().len(), 1);

        // same pair again does not grow the log
        verifier.verify("Copper Ore", "Mithril Ingot");
        assert_eq!(verifier.mismatches().len(), 1);
    }

    #[test]
    fn empty_recognition_never_accepted_by_containment() {
        let mut verifier = NameVerifier::default();
        assert_eq!(verifier.verify("Copper Ore", ""), NameMatch::Mismatch);
    }

    #[test]
    fn mismatch_log_round_trips_sorted_and_deduped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mismatches.txt");

        let mut log = MismatchLog::new();
        log.record("Beta", "8eta");
        log.record("Alpha", "A1pha");
        log.record("Beta", "8eta");
        log.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "Alpha | A1pha\nBeta | 8eta\n");

        let reloaded = MismatchLog::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn correction_table_loads_and_normalizes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrections.json");
        std::fs::write(&path, r#"{"0re": "Ore", "lngot": "Ingot"}"#).unwrap();

        let table = CorrectionTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.apply("copper0re"), "copperore");

        // missing file is an empty table, not an error
        let missing = CorrectionTable::load(dir.path().join("nope.json")).unwrap();
        assert!(missing.is_empty());
    }
}
