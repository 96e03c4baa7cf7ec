//! Triage core error type.
//!
//! The three decision components never raise (fail safe, not loud);
//! errors only exist at the data-loading edge where an operator can
//! supply a regional vocabulary or protocol file.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("vocabulary file is not valid JSON: {0}")]
    VocabularyParse(#[from] serde_json::Error),

    #[error("vocabulary entry '{phrase}' has severity {severity}, expected 1..=10")]
    SeverityOutOfRange { phrase: String, severity: f64 },

    #[error("vocabulary is empty")]
    EmptyVocabulary,
}
